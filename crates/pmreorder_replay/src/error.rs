//! Replay and checker errors.
//!
//! An inconsistent file is not an error: it is reported through
//! [`crate::binary::Consistency`] and only affects the final verdict. Every
//! variant here aborts the run.

use pmreorder_log::LogError;
use std::path::PathBuf;

/// Replay result type
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Fatal replay errors
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// No registered file covers the store
    #[error("No suitable file found for store at {address:#x} (size {size:#x})")]
    NoSuitableFile {
        /// Store address
        address: u64,
        /// Store size
        size: u64,
    },

    /// The registered window reaches past the end of the backing file
    #[error("Store at file offset {offset:#x} (size {size:#x}) is past the end of {file} ({len:#x} bytes)")]
    OutOfBounds {
        /// Backing file
        file: String,
        /// Offset within the file
        offset: u64,
        /// Store size
        size: u64,
        /// File length
        len: u64,
    },

    /// Revert requested for a store that was never applied
    #[error("Cannot revert store at {address:#x}: it was never applied")]
    NotApplied {
        /// Store address
        address: u64,
    },

    /// Opening, mapping or flushing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The checker itself failed, as opposed to reporting inconsistency
    #[error(transparent)]
    Checker(#[from] CheckerError),

    /// The trace could not be parsed
    #[error(transparent)]
    Log(#[from] LogError),

    /// Replay stopped by an interrupt
    #[error("Replay interrupted")]
    Interrupted,
}

/// Failures of the checker invocation itself
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// The checker program could not be started
    #[error("Cannot run checker {program}: {source}")]
    Spawn {
        /// Program path
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The checker program was killed by a signal
    #[error("Checker {program} terminated abnormally while checking {file}")]
    Terminated {
        /// Program path
        program: String,
        /// File being checked
        file: String,
    },

    /// The checker library could not be loaded
    #[error("Cannot load checker library {library}: {reason}")]
    LibraryLoad {
        /// Library path
        library: String,
        /// Loader message
        reason: String,
    },

    /// The checker function is missing from the library
    #[error("Checker function {function} not found in {library}: {reason}")]
    SymbolNotFound {
        /// Library path
        library: String,
        /// Function name
        function: String,
        /// Loader message
        reason: String,
    },

    /// A path or name cannot be passed to C
    #[error("Invalid checker argument {value:?}: contains a NUL byte")]
    InvalidArgument {
        /// Offending value
        value: String,
    },

    /// No checker program was given
    #[error("Checker program path is empty")]
    MissingProgram,
}
