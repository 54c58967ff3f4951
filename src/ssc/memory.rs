//! In-process [`SscApi`] implementation.
//!
//! Stands in for the native library wherever the real engine is not
//! available: unit and integration tests, and local development. Modules are
//! scripted with a Rust closure that reads and writes the data table and
//! emits callback messages. Every free call is counted so release semantics
//! can be checked.

use std::collections::HashMap;
use std::ffi::{CStr, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    ACTION_LOG, ACTION_UPDATE, Handle, ModuleInfo, NativeUpdate, RawMatrix, RawVarInfo, SscApi,
};

/// A value stored in a [`MemoryTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryValue {
    Number(f32),
    String(String),
    Array(Vec<f32>),
    /// Flat row-major buffer, exactly as it crossed the boundary.
    Matrix {
        values: Vec<f32>,
        rows: usize,
        cols: usize,
    },
}

/// Contents of one data object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    values: HashMap<String, MemoryValue>,
}

impl MemoryTable {
    pub fn get(&self, name: &str) -> Option<&MemoryValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(MemoryValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(MemoryValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: MemoryValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn set_number(&mut self, name: &str, value: f32) {
        self.set(name, MemoryValue::Number(value));
    }

    pub fn set_string(&mut self, name: &str, value: &str) {
        self.set(name, MemoryValue::String(value.to_string()));
    }

    pub fn set_array(&mut self, name: &str, values: Vec<f32>) {
        self.set(name, MemoryValue::Array(values));
    }
}

/// Callback channel handed to a scripted module while it runs.
pub struct MemorySession<'a> {
    emit: Option<&'a mut dyn FnMut(NativeUpdate<'_>) -> bool>,
}

impl MemorySession<'_> {
    /// Sends a raw callback; returns the handler's continue flag.
    pub fn raw(&mut self, action: i32, f0: f32, f1: f32, s0: &str) -> bool {
        match self.emit.as_deref_mut() {
            Some(emit) => emit(NativeUpdate {
                action,
                f0,
                f1,
                s0,
                s1: "",
            }),
            None => true,
        }
    }

    /// Emits a log line with the engine severity code (0..=3).
    pub fn log(&mut self, severity: i32, time: f32, text: &str) -> bool {
        self.raw(ACTION_LOG, severity as f32, time, text)
    }

    pub fn progress(&mut self, percent: f32, time: f32, text: &str) -> bool {
        self.raw(ACTION_UPDATE, percent, time, text)
    }
}

type ExecFn = dyn Fn(&mut MemoryTable, &mut MemorySession<'_>) -> bool + Send + Sync;

/// A scripted compute module.
#[derive(Clone)]
pub struct MemoryModule {
    info: ModuleInfo,
    variables: Vec<RawVarInfo>,
    exec: Arc<ExecFn>,
}

impl MemoryModule {
    /// A module that declares no variables and always succeeds.
    pub fn new(name: &str, description: &str, version: i32) -> Self {
        Self {
            info: ModuleInfo {
                name: name.to_string(),
                description: description.to_string(),
                version,
            },
            variables: Vec::new(),
            exec: Arc::new(|_, _| true),
        }
    }

    /// Declares a variable with raw engine codes for its kinds.
    pub fn variable(mut self, var_type: i32, data_type: i32, name: &str, required: &str) -> Self {
        self.variables.push(RawVarInfo {
            var_type,
            data_type,
            name: name.to_string(),
            label: name.replace('_', " "),
            required: required.to_string(),
            ..RawVarInfo::default()
        });
        self
    }

    /// Declares an input (`var_type` 1).
    pub fn input(self, data_type: i32, name: &str) -> Self {
        self.variable(1, data_type, name, "*")
    }

    /// Declares an output (`var_type` 2).
    pub fn output(self, data_type: i32, name: &str) -> Self {
        self.variable(2, data_type, name, "")
    }

    /// Sets the body run on every execution.
    pub fn on_exec<F>(mut self, exec: F) -> Self
    where
        F: Fn(&mut MemoryTable, &mut MemorySession<'_>) -> bool + Send + Sync + 'static,
    {
        self.exec = Arc::new(exec);
        self
    }
}

#[derive(Default)]
struct State {
    next_id: usize,
    data: HashMap<usize, MemoryTable>,
    modules: HashMap<usize, usize>,
}

/// In-memory engine with a fixed module registry.
pub struct MemorySsc {
    version: i32,
    build: String,
    registry: Vec<MemoryModule>,
    state: Mutex<State>,
    data_frees: AtomicUsize,
    module_frees: AtomicUsize,
}

impl Default for MemorySsc {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySsc {
    pub fn new() -> Self {
        Self {
            version: 0,
            build: "memory".to_string(),
            registry: Vec::new(),
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            data_frees: AtomicUsize::new(0),
            module_frees: AtomicUsize::new(0),
        }
    }

    pub fn with_version(mut self, version: i32, build: &str) -> Self {
        self.version = version;
        self.build = build.to_string();
        self
    }

    pub fn with_module(mut self, module: MemoryModule) -> Self {
        self.registry.push(module);
        self
    }

    /// Number of times `data_free` was called.
    pub fn data_free_calls(&self) -> usize {
        self.data_frees.load(Ordering::SeqCst)
    }

    /// Number of times `module_free` was called.
    pub fn module_free_calls(&self) -> usize {
        self.module_frees.load(Ordering::SeqCst)
    }

    /// Data objects created and not yet freed.
    pub fn live_data(&self) -> usize {
        self.lock().data.len()
    }

    /// Modules created and not yet freed.
    pub fn live_modules(&self) -> usize {
        self.lock().modules.len()
    }

    /// Snapshot of a value stored in a live data object.
    pub fn stored(&self, data: Handle, name: &str) -> Option<MemoryValue> {
        self.lock()
            .data
            .get(&data.addr())
            .and_then(|t| t.get(name).cloned())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a scripted module panicked; the maps
        // are still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn allocate(state: &mut State) -> Handle {
        let id = state.next_id;
        state.next_id += 1;
        Handle::from_ptr(ptr::without_provenance_mut::<c_void>(id))
            .unwrap_or_else(|| unreachable!("ids start at 1"))
    }

    fn with_table<T>(&self, data: Handle, f: impl FnOnce(&mut MemoryTable) -> T) -> Option<T> {
        self.lock().data.get_mut(&data.addr()).map(f)
    }

    fn run(
        &self,
        module: Handle,
        data: Handle,
        emit: Option<&mut dyn FnMut(NativeUpdate<'_>) -> bool>,
    ) -> bool {
        let (exec, mut table) = {
            let mut state = self.lock();
            let Some(&index) = state.modules.get(&module.addr()) else {
                return false;
            };
            let Some(table) = state.data.remove(&data.addr()) else {
                return false;
            };
            (Arc::clone(&self.registry[index].exec), table)
        };

        // The lock is not held while the module runs, so callbacks may call
        // back into the engine.
        let mut session = MemorySession { emit };
        let ok = exec(&mut table, &mut session);

        self.lock().data.insert(data.addr(), table);
        ok
    }
}

fn key(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}

impl SscApi for MemorySsc {
    fn version(&self) -> i32 {
        self.version
    }

    fn build_info(&self) -> String {
        self.build.clone()
    }

    fn data_create(&self) -> Option<Handle> {
        let mut state = self.lock();
        let handle = Self::allocate(&mut state);
        state.data.insert(handle.addr(), MemoryTable::default());
        Some(handle)
    }

    fn data_free(&self, data: Handle) {
        self.data_frees.fetch_add(1, Ordering::SeqCst);
        self.lock().data.remove(&data.addr());
    }

    fn data_set_number(&self, data: Handle, name: &CStr, value: f32) {
        self.with_table(data, |t| t.set_number(&key(name), value));
    }

    fn data_set_string(&self, data: Handle, name: &CStr, value: &CStr) {
        self.with_table(data, |t| t.set_string(&key(name), &value.to_string_lossy()));
    }

    fn data_set_array(&self, data: Handle, name: &CStr, values: &[f32]) {
        self.with_table(data, |t| t.set_array(&key(name), values.to_vec()));
    }

    fn data_set_matrix(&self, data: Handle, name: &CStr, values: &[f32], rows: usize, cols: usize) {
        self.with_table(data, |t| {
            t.set(
                &key(name),
                MemoryValue::Matrix {
                    values: values.to_vec(),
                    rows,
                    cols,
                },
            )
        });
    }

    fn data_get_number(&self, data: Handle, name: &CStr) -> Option<f32> {
        self.with_table(data, |t| t.number(&key(name))).flatten()
    }

    fn data_get_string(&self, data: Handle, name: &CStr) -> Option<String> {
        self.with_table(data, |t| t.string(&key(name)).map(str::to_string))
            .flatten()
    }

    fn data_get_array(&self, data: Handle, name: &CStr) -> Option<Vec<f32>> {
        self.with_table(data, |t| match t.get(&key(name)) {
            Some(MemoryValue::Array(values)) => Some(values.clone()),
            _ => None,
        })
        .flatten()
    }

    fn data_get_matrix(&self, data: Handle, name: &CStr) -> Option<RawMatrix> {
        self.with_table(data, |t| match t.get(&key(name)) {
            Some(MemoryValue::Matrix { values, rows, cols }) => Some(RawMatrix {
                values: values.clone(),
                rows: *rows,
                cols: *cols,
            }),
            _ => None,
        })
        .flatten()
    }

    fn module_entry(&self, index: usize) -> Option<ModuleInfo> {
        self.registry.get(index).map(|m| m.info.clone())
    }

    fn module_create(&self, name: &CStr) -> Option<Handle> {
        let name = key(name);
        let index = self.registry.iter().position(|m| m.info.name == name)?;
        let mut state = self.lock();
        let handle = Self::allocate(&mut state);
        state.modules.insert(handle.addr(), index);
        Some(handle)
    }

    fn module_free(&self, module: Handle) {
        self.module_frees.fetch_add(1, Ordering::SeqCst);
        self.lock().modules.remove(&module.addr());
    }

    fn module_var_info(&self, module: Handle, index: usize) -> Option<RawVarInfo> {
        let registry_index = *self.lock().modules.get(&module.addr())?;
        self.registry[registry_index].variables.get(index).cloned()
    }

    fn module_exec(&self, module: Handle, data: Handle) -> bool {
        self.run(module, data, None)
    }

    fn module_exec_with_handler(
        &self,
        module: Handle,
        data: Handle,
        on_update: &mut dyn FnMut(NativeUpdate<'_>) -> bool,
    ) -> bool {
        self.run(module, data, Some(on_update))
    }
}
