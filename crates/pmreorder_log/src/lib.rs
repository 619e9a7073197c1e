//! pmreorder trace log
//!
//! Turns the `|`-separated record stream written by the instrumented program
//! into typed memory operations. Reorder scopes opened by user markers are
//! tracked on an engine stack so every marker resolves to the engine that
//! governs the stores following it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod factory;
pub mod log;
pub mod markers;
pub mod operation;

pub use engine::EngineKind;
pub use error::{LogError, LogResult};
pub use factory::{EngineStack, OperationFactory};
pub use log::{MarkerRecord, OperationsLog};
pub use markers::MarkerTable;
pub use operation::{Flush, MemoryOperation, RegisterFile, ReorderMarker, StackTrace, Store};
