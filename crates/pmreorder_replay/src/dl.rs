//! Minimal dynamic library loading for in-process checkers.
//!
//! Wraps `dlopen`/`dlsym` directly; only Unix hosts are supported.

use std::ffi::{c_void, CStr};

/// Handle to a dynamically loaded shared library
#[derive(Debug)]
pub struct DynLib {
    handle: *mut c_void,
}

impl DynLib {
    /// Open a shared library by path or soname.
    ///
    /// # Errors
    ///
    /// Returns the loader's message when the library cannot be opened.
    pub fn open(name: &CStr) -> Result<Self, String> {
        #[cfg(unix)]
        {
            // SAFETY: name is a valid C string. RTLD_NOW resolves every
            // symbol up front; RTLD_LOCAL keeps them private to this handle.
            let handle = unsafe { dlopen(name.as_ptr(), RTLD_NOW | RTLD_LOCAL) };
            if handle.is_null() {
                return Err(last_error().unwrap_or_else(|| "unknown dlopen error".to_string()));
            }
            Ok(Self { handle })
        }

        #[cfg(not(unix))]
        {
            let _ = name;
            Err("dynamic library loading not supported on this platform".to_string())
        }
    }

    /// Look up a symbol by name.
    ///
    /// # Safety
    ///
    /// The caller must cast the pointer to the symbol's real type before use
    /// and must not use it after this handle is dropped.
    pub unsafe fn sym(&self, name: &CStr) -> Result<*mut c_void, String> {
        #[cfg(unix)]
        {
            // SAFETY: the handle is live for &self; dlerror is called first
            // to clear any stale error state.
            unsafe {
                dlerror();
                let ptr = dlsym(self.handle, name.as_ptr());
                if let Some(msg) = last_error() {
                    return Err(msg);
                }
                if ptr.is_null() {
                    return Err(format!("symbol {:?} resolved to NULL", name));
                }
                Ok(ptr)
            }
        }

        #[cfg(not(unix))]
        {
            let _ = name;
            Err("dynamic library loading not supported on this platform".to_string())
        }
    }
}

impl Drop for DynLib {
    fn drop(&mut self) {
        #[cfg(unix)]
        if !self.handle.is_null() {
            // SAFETY: the handle came from a successful dlopen and no symbol
            // obtained from it outlives self.
            unsafe {
                dlclose(self.handle);
            }
        }
    }
}

#[cfg(unix)]
fn last_error() -> Option<String> {
    // SAFETY: dlerror returns NULL or a thread-local NUL-terminated string.
    let err = unsafe { dlerror() };
    if err.is_null() {
        None
    } else {
        // SAFETY: non-null result of dlerror points to a valid C string.
        Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
    }
}

#[cfg(unix)]
const RTLD_NOW: i32 = 2;
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
const RTLD_LOCAL: i32 = 0;
#[cfg(any(target_os = "macos", target_os = "ios"))]
const RTLD_LOCAL: i32 = 4;

#[cfg(unix)]
#[cfg_attr(all(target_os = "linux", target_env = "gnu"), link(name = "dl"))]
unsafe extern "C" {
    fn dlopen(filename: *const std::ffi::c_char, flags: i32) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const std::ffi::c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> i32;
    fn dlerror() -> *const std::ffi::c_char;
}
