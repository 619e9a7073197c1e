//! pmreorder replay engine
//!
//! Replays a parsed trace epoch by epoch against the memory-mapped files it
//! registered. At every flush+fence barrier the active reorder engine
//! proposes sequences of the flushed stores; each sequence is applied, the
//! files are handed to a consistency checker, and the sequence is reverted
//! before the next one. The stores are then applied for real.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod checker;
pub mod context;
pub mod dl;
pub mod engines;
pub mod error;
pub mod sequence;
pub mod state;

pub use binary::{BinaryFile, BinaryOutputHandler, Consistency};
pub use checker::{CheckerPolarity, ConsistencyChecker, LibChecker, ProgChecker, MARKERS_ENV};
pub use context::{OpsContext, ReorderConfig};
pub use engines::{EngineSpec, ReorderEngine, SizeFilter};
pub use error::{CheckerError, ReplayError, ReplayResult};
pub use state::{ReplayRuntime, StateMachine};

/// Serializes tests that spawn checkers, load libraries or write the
/// environment. `set_var` is unsound while another thread reads it.
#[cfg(test)]
pub(crate) fn process_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
