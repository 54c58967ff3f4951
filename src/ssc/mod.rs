//! Bridge to the SSC simulation core.
//!
//! The engine is only reachable through a C-style procedural interface,
//! modelled here by the [`SscApi`] trait. [`native::NativeSsc`] binds the
//! trait to the shared library; [`memory::MemorySsc`] is an in-process
//! stand-in used by tests. Everything above this layer talks to
//! `Arc<dyn SscApi>` and never touches raw pointers.

pub mod data;
pub mod handler;
pub mod memory;
pub mod module;
pub mod native;
pub mod runner;
pub mod simulation;
pub mod variables;

use std::ffi::{CStr, c_void};
use std::ptr::NonNull;

use serde::Serialize;

pub use data::{DataContainer, SscNumber};
pub use handler::{ExecutionHandler, LogMessage, MessageCollector, MessageRecorder, MessageType};
pub use module::{DataType, ModuleSummary, SscModule, VarType, Variable, module_summary};
pub use runner::SimulationRunner;
pub use simulation::{ModuleSimulation, simulate_json};
pub use variables::{Var, VarKind};

/// Callback action code for a log line.
pub const ACTION_LOG: i32 = 0;
/// Callback action code for a progress tick.
pub const ACTION_UPDATE: i32 = 1;

/// Opaque engine handle (data object, module, or registry entry).
///
/// Handles are plain addresses owned by the engine. They are `!Send`, so the
/// owning wrappers built on top of them cannot leave the thread that created
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonNull<c_void>);

impl Handle {
    /// Wraps a raw engine pointer; `None` for the null sentinel.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Returns the raw pointer for passing back across the boundary.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Numeric address of the handle, usable as a map key.
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

/// One entry of the engine's module registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Registry name used to create the module.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Module version number.
    pub version: i32,
}

/// Engine version and build string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SscInfo {
    pub version: i32,
    pub build: String,
}

impl SscInfo {
    /// Queries the engine for its version information.
    pub fn query(api: &dyn SscApi) -> Self {
        Self {
            version: api.version(),
            build: api.build_info(),
        }
    }
}

/// Variable metadata exactly as the engine reports it, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawVarInfo {
    pub var_type: i32,
    pub data_type: i32,
    pub name: String,
    pub label: String,
    pub units: String,
    pub meta: String,
    pub group: String,
    pub required: String,
}

/// Flat row-major matrix plus the dimensions reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatrix {
    pub values: Vec<f32>,
    pub rows: usize,
    pub cols: usize,
}

/// One invocation of the engine's execution callback.
///
/// For [`ACTION_LOG`], `f0` is the severity code, `f1` the simulated time and
/// `s0` the message. For [`ACTION_UPDATE`], `f0` is percent complete.
#[derive(Debug, Clone, Copy)]
pub struct NativeUpdate<'a> {
    pub action: i32,
    pub f0: f32,
    pub f1: f32,
    pub s0: &'a str,
    pub s1: &'a str,
}

/// The engine's procedural interface.
///
/// Mirrors the `ssc_*` C functions one to one. Implementations copy any
/// engine-owned buffers into owned Rust values before returning, so callers
/// never hold pointers into engine memory. Getters return `None` where the
/// engine signals "not found" with a null result.
pub trait SscApi: Send + Sync {
    fn version(&self) -> i32;
    fn build_info(&self) -> String;

    fn data_create(&self) -> Option<Handle>;
    fn data_free(&self, data: Handle);
    fn data_set_number(&self, data: Handle, name: &CStr, value: f32);
    fn data_set_string(&self, data: Handle, name: &CStr, value: &CStr);
    fn data_set_array(&self, data: Handle, name: &CStr, values: &[f32]);
    fn data_set_matrix(&self, data: Handle, name: &CStr, values: &[f32], rows: usize, cols: usize);
    fn data_get_number(&self, data: Handle, name: &CStr) -> Option<f32>;
    fn data_get_string(&self, data: Handle, name: &CStr) -> Option<String>;
    fn data_get_array(&self, data: Handle, name: &CStr) -> Option<Vec<f32>>;
    fn data_get_matrix(&self, data: Handle, name: &CStr) -> Option<RawMatrix>;

    /// Registry entry at `index`, or `None` past the end of the registry.
    fn module_entry(&self, index: usize) -> Option<ModuleInfo>;
    fn module_create(&self, name: &CStr) -> Option<Handle>;
    fn module_free(&self, module: Handle);
    /// Variable metadata at `index`, or `None` past the last variable.
    fn module_var_info(&self, module: Handle, index: usize) -> Option<RawVarInfo>;

    /// Runs the module to completion without a message stream.
    fn module_exec(&self, module: Handle, data: Handle) -> bool;

    /// Runs the module to completion, invoking `on_update` on the calling
    /// thread for every log line or progress tick. Returning `false` from
    /// the callback asks the engine to abort.
    fn module_exec_with_handler(
        &self,
        module: Handle,
        data: Handle,
        on_update: &mut dyn FnMut(NativeUpdate<'_>) -> bool,
    ) -> bool;
}

/// Errors raised by the bridge.
#[derive(thiserror::Error, Debug)]
pub enum SscError {
    /// No module with this name exists in the engine registry.
    #[error("the module with the name \"{0}\" does not exist")]
    UnknownModule(String),
    /// A data container or module handle was used after release.
    #[error("this {0} has already been released")]
    Released(&'static str),
    #[error("invalid value for \"{name}\": {reason}")]
    InvalidArgument { name: String, reason: String },
    /// An output the caller depends on was not produced by the engine.
    #[error("engine did not produce output \"{0}\"")]
    MissingOutput(String),
    #[error("engine failed to allocate a data container")]
    AllocationFailed,
    #[error("failed to load SSC library: {0}")]
    Library(#[from] libloading::Error),
}

impl SscError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Enumerates the engine's module registry until the end-of-list sentinel.
pub fn available_modules(api: &dyn SscApi) -> Vec<ModuleInfo> {
    (0..).map_while(|index| api.module_entry(index)).collect()
}

/// Looks up one registry entry by name.
pub fn find_module(api: &dyn SscApi, name: &str) -> Option<ModuleInfo> {
    (0..)
        .map_while(|index| api.module_entry(index))
        .find(|entry| entry.name == name)
}
