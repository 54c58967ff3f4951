//! [`SscApi`] backed by the SSC shared library, loaded at runtime.

use std::any::Any;
use std::ffi::{CStr, c_char, c_float, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::slice;

use libloading::Library;
use tracing::info;

use super::{Handle, ModuleInfo, NativeUpdate, RawMatrix, RawVarInfo, SscApi, SscError};

type Ptr = *mut c_void;
type SscBool = c_int;

type HandlerFn = unsafe extern "C" fn(
    module: Ptr,
    handler: Ptr,
    action: c_int,
    f0: c_float,
    f1: c_float,
    s0: *const c_char,
    s1: *const c_char,
    user_data: Ptr,
) -> SscBool;

/// Function pointers resolved from the library.
///
/// Copied out of their `Symbol`s at load time; they stay valid for as long
/// as the owning [`Library`] is alive.
struct Symbols {
    version: unsafe extern "C" fn() -> c_int,
    build_info: unsafe extern "C" fn() -> *const c_char,
    data_create: unsafe extern "C" fn() -> Ptr,
    data_free: unsafe extern "C" fn(Ptr),
    data_set_number: unsafe extern "C" fn(Ptr, *const c_char, c_float),
    data_set_string: unsafe extern "C" fn(Ptr, *const c_char, *const c_char),
    data_set_array: unsafe extern "C" fn(Ptr, *const c_char, *const c_float, c_int),
    data_set_matrix: unsafe extern "C" fn(Ptr, *const c_char, *const c_float, c_int, c_int),
    data_get_number: unsafe extern "C" fn(Ptr, *const c_char, *mut c_float) -> SscBool,
    data_get_string: unsafe extern "C" fn(Ptr, *const c_char) -> *const c_char,
    data_get_array: unsafe extern "C" fn(Ptr, *const c_char, *mut c_int) -> *const c_float,
    data_get_matrix:
        unsafe extern "C" fn(Ptr, *const c_char, *mut c_int, *mut c_int) -> *const c_float,
    module_entry: unsafe extern "C" fn(c_int) -> Ptr,
    entry_name: unsafe extern "C" fn(Ptr) -> *const c_char,
    entry_description: unsafe extern "C" fn(Ptr) -> *const c_char,
    entry_version: unsafe extern "C" fn(Ptr) -> c_int,
    module_create: unsafe extern "C" fn(*const c_char) -> Ptr,
    module_free: unsafe extern "C" fn(Ptr),
    module_var_info: unsafe extern "C" fn(Ptr, c_int) -> Ptr,
    info_var_type: unsafe extern "C" fn(Ptr) -> c_int,
    info_data_type: unsafe extern "C" fn(Ptr) -> c_int,
    info_name: unsafe extern "C" fn(Ptr) -> *const c_char,
    info_label: unsafe extern "C" fn(Ptr) -> *const c_char,
    info_units: unsafe extern "C" fn(Ptr) -> *const c_char,
    info_meta: unsafe extern "C" fn(Ptr) -> *const c_char,
    info_group: unsafe extern "C" fn(Ptr) -> *const c_char,
    info_required: unsafe extern "C" fn(Ptr) -> *const c_char,
    module_exec: unsafe extern "C" fn(Ptr, Ptr) -> SscBool,
    module_exec_with_handler: unsafe extern "C" fn(Ptr, Ptr, HandlerFn, Ptr) -> SscBool,
}

/// The SSC shared library.
///
/// Loaded once per process and shared behind `Arc<dyn SscApi>`. Individual
/// data objects and modules must still be used from a single thread.
pub struct NativeSsc {
    sym: Symbols,
    _library: Library,
}

impl NativeSsc {
    /// Loads the library at `path` and resolves every `ssc_*` entry point.
    ///
    /// # Errors
    ///
    /// Returns [`SscError::Library`] if the library cannot be opened or a
    /// symbol is missing.
    pub fn load(path: &Path) -> Result<Self, SscError> {
        // SAFETY: loading runs the library's initializers; SSC has none with
        // preconditions beyond being a well-formed shared object.
        let library = unsafe { Library::new(path)? };
        // SAFETY: each symbol is declared with the signature from sscapi.h.
        let sym = unsafe {
            Symbols {
                version: symbol(&library, b"ssc_version\0")?,
                build_info: symbol(&library, b"ssc_build_info\0")?,
                data_create: symbol(&library, b"ssc_data_create\0")?,
                data_free: symbol(&library, b"ssc_data_free\0")?,
                data_set_number: symbol(&library, b"ssc_data_set_number\0")?,
                data_set_string: symbol(&library, b"ssc_data_set_string\0")?,
                data_set_array: symbol(&library, b"ssc_data_set_array\0")?,
                data_set_matrix: symbol(&library, b"ssc_data_set_matrix\0")?,
                data_get_number: symbol(&library, b"ssc_data_get_number\0")?,
                data_get_string: symbol(&library, b"ssc_data_get_string\0")?,
                data_get_array: symbol(&library, b"ssc_data_get_array\0")?,
                data_get_matrix: symbol(&library, b"ssc_data_get_matrix\0")?,
                module_entry: symbol(&library, b"ssc_module_entry\0")?,
                entry_name: symbol(&library, b"ssc_entry_name\0")?,
                entry_description: symbol(&library, b"ssc_entry_description\0")?,
                entry_version: symbol(&library, b"ssc_entry_version\0")?,
                module_create: symbol(&library, b"ssc_module_create\0")?,
                module_free: symbol(&library, b"ssc_module_free\0")?,
                module_var_info: symbol(&library, b"ssc_module_var_info\0")?,
                info_var_type: symbol(&library, b"ssc_info_var_type\0")?,
                info_data_type: symbol(&library, b"ssc_info_data_type\0")?,
                info_name: symbol(&library, b"ssc_info_name\0")?,
                info_label: symbol(&library, b"ssc_info_label\0")?,
                info_units: symbol(&library, b"ssc_info_units\0")?,
                info_meta: symbol(&library, b"ssc_info_meta\0")?,
                info_group: symbol(&library, b"ssc_info_group\0")?,
                info_required: symbol(&library, b"ssc_info_required\0")?,
                module_exec: symbol(&library, b"ssc_module_exec\0")?,
                module_exec_with_handler: symbol(&library, b"ssc_module_exec_with_handler\0")?,
            }
        };

        let ssc = Self {
            sym,
            _library: library,
        };
        info!(
            path = %path.display(),
            version = ssc.version(),
            "loaded SSC library"
        );
        Ok(ssc)
    }
}

/// Resolves `name` and copies the function pointer out of its `Symbol`.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, libloading::Error> {
    // SAFETY: forwarded to the caller, who guarantees `T` matches the symbol.
    unsafe { library.get::<T>(name).map(|s| *s) }
}

/// Copies an engine-owned C string; null maps to `None`.
unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null engine strings are NUL-terminated and live until the
    // next call on the same object.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Copies `len` floats out of an engine-owned buffer.
unsafe fn owned_floats(ptr: *const c_float, len: usize) -> Vec<f32> {
    if len == 0 {
        return Vec::new();
    }
    // SAFETY: the engine reported `len` readable values at `ptr`.
    unsafe { slice::from_raw_parts(ptr, len) }.to_vec()
}

fn dim(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

fn count(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// State shared with [`trampoline`] through the `user_data` pointer.
struct CallbackState<'a> {
    on_update: &'a mut dyn FnMut(NativeUpdate<'_>) -> bool,
    panic: Option<Box<dyn Any + Send>>,
}

/// C callback handed to `ssc_module_exec_with_handler`.
///
/// A panic must not unwind through engine frames, so it is caught here,
/// the engine is told to abort, and the panic resumes once control is back
/// in Rust.
unsafe extern "C" fn trampoline(
    _module: Ptr,
    _handler: Ptr,
    action: c_int,
    f0: c_float,
    f1: c_float,
    s0: *const c_char,
    s1: *const c_char,
    user_data: Ptr,
) -> SscBool {
    // SAFETY: `user_data` is the `CallbackState` passed in
    // `module_exec_with_handler`, alive for the whole blocking call.
    let state = unsafe { &mut *user_data.cast::<CallbackState<'_>>() };
    if state.panic.is_some() {
        return 0;
    }

    // SAFETY: engine strings are valid for the duration of the callback.
    let s0 = unsafe { owned_string(s0) }.unwrap_or_default();
    let s1 = unsafe { owned_string(s1) }.unwrap_or_default();
    let update = NativeUpdate {
        action,
        f0,
        f1,
        s0: &s0,
        s1: &s1,
    };

    match panic::catch_unwind(AssertUnwindSafe(|| (state.on_update)(update))) {
        Ok(keep_going) => SscBool::from(keep_going),
        Err(payload) => {
            state.panic = Some(payload);
            0
        }
    }
}

// SAFETY (applies to every `unsafe` block below): handles originate from
// this library's own constructors and are only freed through the owning
// wrappers, which never use them afterwards. Names and values are valid
// NUL-terminated strings and slices borrowed for the duration of the call.
impl SscApi for NativeSsc {
    fn version(&self) -> i32 {
        unsafe { (self.sym.version)() }
    }

    fn build_info(&self) -> String {
        unsafe { owned_string((self.sym.build_info)()) }.unwrap_or_default()
    }

    fn data_create(&self) -> Option<Handle> {
        Handle::from_ptr(unsafe { (self.sym.data_create)() })
    }

    fn data_free(&self, data: Handle) {
        unsafe { (self.sym.data_free)(data.as_ptr()) }
    }

    fn data_set_number(&self, data: Handle, name: &CStr, value: f32) {
        unsafe { (self.sym.data_set_number)(data.as_ptr(), name.as_ptr(), value) }
    }

    fn data_set_string(&self, data: Handle, name: &CStr, value: &CStr) {
        unsafe { (self.sym.data_set_string)(data.as_ptr(), name.as_ptr(), value.as_ptr()) }
    }

    fn data_set_array(&self, data: Handle, name: &CStr, values: &[f32]) {
        unsafe {
            (self.sym.data_set_array)(
                data.as_ptr(),
                name.as_ptr(),
                values.as_ptr(),
                dim(values.len()),
            )
        }
    }

    fn data_set_matrix(&self, data: Handle, name: &CStr, values: &[f32], rows: usize, cols: usize) {
        debug_assert_eq!(values.len(), rows * cols);
        unsafe {
            (self.sym.data_set_matrix)(
                data.as_ptr(),
                name.as_ptr(),
                values.as_ptr(),
                dim(rows),
                dim(cols),
            )
        }
    }

    fn data_get_number(&self, data: Handle, name: &CStr) -> Option<f32> {
        let mut value: c_float = 0.0;
        let found = unsafe { (self.sym.data_get_number)(data.as_ptr(), name.as_ptr(), &mut value) };
        (found != 0).then_some(value)
    }

    fn data_get_string(&self, data: Handle, name: &CStr) -> Option<String> {
        unsafe { owned_string((self.sym.data_get_string)(data.as_ptr(), name.as_ptr())) }
    }

    fn data_get_array(&self, data: Handle, name: &CStr) -> Option<Vec<f32>> {
        let mut len: c_int = 0;
        let ptr = unsafe { (self.sym.data_get_array)(data.as_ptr(), name.as_ptr(), &mut len) };
        if ptr.is_null() {
            return None;
        }
        Some(unsafe { owned_floats(ptr, count(len)) })
    }

    fn data_get_matrix(&self, data: Handle, name: &CStr) -> Option<RawMatrix> {
        let mut rows: c_int = 0;
        let mut cols: c_int = 0;
        let ptr = unsafe {
            (self.sym.data_get_matrix)(data.as_ptr(), name.as_ptr(), &mut rows, &mut cols)
        };
        if ptr.is_null() {
            return None;
        }
        let (rows, cols) = (count(rows), count(cols));
        Some(RawMatrix {
            values: unsafe { owned_floats(ptr, rows * cols) },
            rows,
            cols,
        })
    }

    fn module_entry(&self, index: usize) -> Option<ModuleInfo> {
        let index = c_int::try_from(index).ok()?;
        let entry = unsafe { (self.sym.module_entry)(index) };
        if entry.is_null() {
            return None;
        }
        unsafe {
            Some(ModuleInfo {
                name: owned_string((self.sym.entry_name)(entry)).unwrap_or_default(),
                description: owned_string((self.sym.entry_description)(entry)).unwrap_or_default(),
                version: (self.sym.entry_version)(entry),
            })
        }
    }

    fn module_create(&self, name: &CStr) -> Option<Handle> {
        Handle::from_ptr(unsafe { (self.sym.module_create)(name.as_ptr()) })
    }

    fn module_free(&self, module: Handle) {
        unsafe { (self.sym.module_free)(module.as_ptr()) }
    }

    fn module_var_info(&self, module: Handle, index: usize) -> Option<RawVarInfo> {
        let index = c_int::try_from(index).ok()?;
        let info = unsafe { (self.sym.module_var_info)(module.as_ptr(), index) };
        if info.is_null() {
            return None;
        }
        let text = |f: unsafe extern "C" fn(Ptr) -> *const c_char| {
            unsafe { owned_string(f(info)) }.unwrap_or_default()
        };
        Some(RawVarInfo {
            var_type: unsafe { (self.sym.info_var_type)(info) },
            data_type: unsafe { (self.sym.info_data_type)(info) },
            name: text(self.sym.info_name),
            label: text(self.sym.info_label),
            units: text(self.sym.info_units),
            meta: text(self.sym.info_meta),
            group: text(self.sym.info_group),
            required: text(self.sym.info_required),
        })
    }

    fn module_exec(&self, module: Handle, data: Handle) -> bool {
        unsafe { (self.sym.module_exec)(module.as_ptr(), data.as_ptr()) != 0 }
    }

    fn module_exec_with_handler(
        &self,
        module: Handle,
        data: Handle,
        on_update: &mut dyn FnMut(NativeUpdate<'_>) -> bool,
    ) -> bool {
        let mut state = CallbackState {
            on_update,
            panic: None,
        };
        let user_data = (&raw mut state).cast::<c_void>();
        let ok = unsafe {
            (self.sym.module_exec_with_handler)(module.as_ptr(), data.as_ptr(), trampoline, user_data)
        };
        if let Some(payload) = state.panic.take() {
            panic::resume_unwind(payload);
        }
        ok != 0
    }
}
