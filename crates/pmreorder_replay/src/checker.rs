//! Consistency checkers.
//!
//! A checker maps the path of a mapped file to an integer verdict. How that
//! integer is read is decided by [`CheckerPolarity`], never by the checker.
//! Checker faults (cannot spawn, killed by a signal, missing symbol) are
//! [`CheckerError`]s and abort the run; they are never read as a verdict.

use crate::dl::DynLib;
use crate::error::CheckerError;
use serde::{Deserialize, Serialize};
use std::ffi::{c_char, c_int, CString};
use std::path::Path;
use std::process::Command;

/// Environment variable listing the markers passed so far, `|`-joined
pub const MARKERS_ENV: &str = "PMREORDER_MARKERS";

/// How a checker's integer result maps to consistent/inconsistent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckerPolarity {
    /// 0 means inconsistent, anything else consistent
    ZeroIsInconsistent,
    /// 0 means consistent, anything else inconsistent (exit-status style)
    ZeroIsConsistent,
}

impl CheckerPolarity {
    /// Read a raw checker result
    #[must_use]
    pub const fn is_consistent(self, code: i32) -> bool {
        match self {
            Self::ZeroIsInconsistent => code != 0,
            Self::ZeroIsConsistent => code == 0,
        }
    }
}

impl Default for CheckerPolarity {
    fn default() -> Self {
        Self::ZeroIsInconsistent
    }
}

/// Something that can judge a mapped file
pub trait ConsistencyChecker {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Raw verdict for `file`; `markers` lists the markers passed so far.
    ///
    /// # Errors
    ///
    /// Returns `CheckerError` when the checker could not produce a verdict.
    fn check_consistency(&self, file: &Path, markers: &str) -> Result<i32, CheckerError>;
}

/// External checker program
///
/// Runs `program args... <file>` and returns its exit status. The program and
/// its arguments are taken as given; no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgChecker {
    program: String,
    args: Vec<String>,
}

impl ProgChecker {
    /// Checker running `program` with fixed `args`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    ///
    /// # Errors
    ///
    /// Returns `CheckerError::MissingProgram` for a blank line.
    pub fn from_command_line(line: &str) -> Result<Self, CheckerError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(CheckerError::MissingProgram)?;
        Ok(Self::new(program, parts.collect()))
    }

    /// Program path
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ConsistencyChecker for ProgChecker {
    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn check_consistency(&self, file: &Path, markers: &str) -> Result<i32, CheckerError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file)
            .env(MARKERS_ENV, markers)
            .status()
            .map_err(|source| CheckerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let code = status.code().ok_or_else(|| CheckerError::Terminated {
            program: self.program.clone(),
            file: file.display().to_string(),
        })?;
        tracing::debug!("checker {} returned {} for {}", self.program, code, file.display());
        Ok(code)
    }
}

type CheckFn = unsafe extern "C" fn(*const c_char) -> c_int;

/// In-process checker function `int fn(const char *path)` from a shared
/// library.
///
/// The function runs unisolated: a crash inside it takes the whole run down.
#[derive(Debug)]
pub struct LibChecker {
    library: String,
    function: String,
    func: CheckFn,
    _lib: DynLib,
}

impl LibChecker {
    /// Load `function` from `library`.
    ///
    /// # Errors
    ///
    /// Returns `CheckerError::LibraryLoad` or `CheckerError::SymbolNotFound`.
    pub fn open(library: &str, function: &str) -> Result<Self, CheckerError> {
        let lib_name = c_string(library)?;
        let fn_name = c_string(function)?;

        let lib = DynLib::open(&lib_name).map_err(|reason| CheckerError::LibraryLoad {
            library: library.to_string(),
            reason,
        })?;
        // SAFETY: the pointer is immediately given the checker signature the
        // library is required to export, and `lib` is kept alive alongside it.
        let func = unsafe {
            let ptr = lib
                .sym(&fn_name)
                .map_err(|reason| CheckerError::SymbolNotFound {
                    library: library.to_string(),
                    function: function.to_string(),
                    reason,
                })?;
            std::mem::transmute::<*mut std::ffi::c_void, CheckFn>(ptr)
        };

        tracing::debug!("loaded checker {} from {}", function, library);
        Ok(Self {
            library: library.to_string(),
            function: function.to_string(),
            func,
            _lib: lib,
        })
    }
}

impl ConsistencyChecker for LibChecker {
    fn describe(&self) -> String {
        format!("{}:{}", self.library, self.function)
    }

    fn check_consistency(&self, file: &Path, markers: &str) -> Result<i32, CheckerError> {
        let path = path_c_string(file)?;
        // SAFETY: callers must not touch the environment from other threads
        // while a check runs. Replay drives checks from one thread.
        unsafe {
            std::env::set_var(MARKERS_ENV, markers);
        }
        // SAFETY: func has the exported checker signature and path is a
        // valid NUL-terminated string that outlives the call.
        let code = unsafe { (self.func)(path.as_ptr()) };
        tracing::debug!("checker {} returned {} for {}", self.function, code, file.display());
        Ok(code)
    }
}

fn c_string(value: &str) -> Result<CString, CheckerError> {
    CString::new(value).map_err(|_| CheckerError::InvalidArgument {
        value: value.to_string(),
    })
}

#[cfg(unix)]
fn path_c_string(path: &Path) -> Result<CString, CheckerError> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|_| CheckerError::InvalidArgument {
        value: path.display().to_string(),
    })
}

#[cfg(not(unix))]
fn path_c_string(path: &Path) -> Result<CString, CheckerError> {
    c_string(&path.to_string_lossy())
}
