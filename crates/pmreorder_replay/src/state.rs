//! Epoch state machine.
//!
//! Stores are collected until a flush has been seen and a fence follows it.
//! That fence closes the epoch: the flushed stores are speculatively replayed
//! in every order the active engine proposes, then written for real. Stores
//! no flush covered are carried into the next epoch.

use crate::binary::{BinaryOutputHandler, Consistency};
use crate::engines::{EngineSpec, ReorderEngine};
use crate::error::{CheckerError, ReplayError, ReplayResult};
use pmreorder_core::AddressRange;
use pmreorder_log::{Flush, LogError, MemoryOperation, OperationsLog, RegisterFile, ReorderMarker, Store};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Everything the state machine acts on
#[derive(Debug)]
pub struct ReplayRuntime {
    handler: BinaryOutputHandler,
    default_engine: EngineSpec,
    engine: Box<dyn ReorderEngine>,
    rng: ChaCha8Rng,
    markers: String,
}

impl ReplayRuntime {
    /// Runtime starting on `default_engine`; `rng` seeds every engine built
    #[must_use]
    pub fn new(handler: BinaryOutputHandler, default_engine: EngineSpec, mut rng: ChaCha8Rng) -> Self {
        let engine = default_engine.build(rng.r#gen());
        Self {
            handler,
            default_engine,
            engine,
            rng,
            markers: String::new(),
        }
    }

    /// Active engine
    #[must_use]
    pub fn engine(&self) -> &dyn ReorderEngine {
        self.engine.as_ref()
    }

    /// Whether barriers are checked under the active engine
    #[must_use]
    pub fn test_on_barrier(&self) -> bool {
        self.engine.test_on_barrier()
    }

    /// Output files
    #[must_use]
    pub fn handler(&self) -> &BinaryOutputHandler {
        &self.handler
    }

    /// Markers passed to checkers, `|`-joined
    #[must_use]
    pub fn markers(&self) -> &str {
        &self.markers
    }

    fn switch_engine(&mut self, marker: &ReorderMarker) {
        let spec = EngineSpec::for_kind(marker.kind).unwrap_or(self.default_engine);
        self.engine = spec.build(self.rng.r#gen());
        debug!("{} switched engine to {}", marker.label, self.engine.name());
    }

    fn register(&mut self, file: &RegisterFile) -> ReplayResult<()> {
        let window = AddressRange::new(file.address, file.size).map_err(|err| {
            LogError::MalformedRecord {
                record: file.name.clone(),
                reason: err.to_string(),
            }
        })?;
        self.handler.add_file(Path::new(&file.name), window, file.offset)
    }
}

/// Progress through the current epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Dirty,
    Flush,
    Fence,
}

#[derive(Debug)]
enum State {
    Init,
    Collecting { stores: Vec<Store>, phase: Phase },
    Replaying,
}

/// Drives a trace through collect and replay
#[derive(Debug)]
pub struct StateMachine {
    state: State,
    carried: Vec<Store>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Machine in its initial state
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Init,
            carried: Vec::new(),
        }
    }

    /// Unflushed stores waiting for a later epoch
    #[must_use]
    pub fn carried(&self) -> &[Store] {
        &self.carried
    }

    /// Feed every operation of `log` through the machine.
    ///
    /// Returns `true` when every checked sequence was consistent.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error, or with `ReplayError::Interrupted`
    /// once `interrupt` is raised. The flag is read before every operation
    /// and after every checked sequence has been reverted, so an interrupted
    /// run leaves the files as the last completed epoch wrote them.
    pub fn run_all(
        &mut self,
        runtime: &mut ReplayRuntime,
        log: &OperationsLog,
        interrupt: Option<&AtomicBool>,
    ) -> ReplayResult<bool> {
        let mut all_consistent = true;
        for (index, op) in log.operations().iter().enumerate() {
            if raised(interrupt) {
                warn!("interrupted before operation {}", index);
                return Err(ReplayError::Interrupted);
            }
            info!("{}", op);
            runtime.markers = log.markers_before(index);
            info!("{}", runtime.markers);

            if !self.step(runtime, op, interrupt)? {
                all_consistent = false;
            }
        }
        Ok(all_consistent)
    }

    /// Advance on one operation, then act on it in the new state
    fn step(
        &mut self,
        runtime: &mut ReplayRuntime,
        op: &MemoryOperation,
        interrupt: Option<&AtomicBool>,
    ) -> ReplayResult<bool> {
        match std::mem::replace(&mut self.state, State::Replaying) {
            State::Collecting { stores, phase }
                if phase == Phase::Flush && matches!(op, MemoryOperation::Fence) =>
            {
                let (flushed, unflushed): (Vec<Store>, Vec<Store>) =
                    stores.into_iter().partition(|s| s.flushed);
                self.carried = unflushed;
                return replay(runtime, flushed, interrupt);
            }
            State::Collecting { stores, phase } => {
                self.state = State::Collecting { stores, phase };
            }
            State::Init | State::Replaying => {
                self.state = State::Collecting {
                    stores: std::mem::take(&mut self.carried),
                    phase: Phase::Init,
                };
            }
        }

        if let State::Collecting { stores, phase } = &mut self.state {
            *phase = next_phase(*phase, op);
            match op {
                MemoryOperation::Store(store) => stores.push(store.clone()),
                MemoryOperation::Flush(flush) => flush_stores(stores, flush),
                MemoryOperation::ReorderMarker(marker) => runtime.switch_engine(marker),
                MemoryOperation::RegisterFile(file) => runtime.register(file)?,
                MemoryOperation::Fence => {}
            }
        }
        Ok(true)
    }
}

fn raised(interrupt: Option<&AtomicBool>) -> bool {
    interrupt.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn next_phase(phase: Phase, op: &MemoryOperation) -> Phase {
    match (phase, op) {
        (Phase::Init, MemoryOperation::Store(_)) => Phase::Dirty,
        (Phase::Init | Phase::Dirty, MemoryOperation::Flush(_)) => Phase::Flush,
        (Phase::Flush, MemoryOperation::Fence) => Phase::Fence,
        (phase, _) => phase,
    }
}

fn flush_stores(stores: &mut [Store], flush: &Flush) {
    for store in stores.iter_mut().filter(|s| flush.covers(s)) {
        store.mark_flushed();
    }
}

/// Check every proposed ordering of `flushed`, then persist it in trace order
fn replay(
    runtime: &mut ReplayRuntime,
    mut flushed: Vec<Store>,
    interrupt: Option<&AtomicBool>,
) -> ReplayResult<bool> {
    let mut consistent = true;

    if runtime.test_on_barrier() {
        debug!("Current reorder engine: {}", runtime.engine.name());
        let ReplayRuntime {
            handler,
            engine,
            markers,
            ..
        } = runtime;

        for (i, seq) in engine.generate_sequence(flushed.len()).enumerate() {
            debug!("NEXT Sequence (no. {}) with length: {}", i, seq.len());
            for (j, &idx) in seq.iter().enumerate() {
                debug!("NEXT Operation (no. {}): {}", j, flushed[idx]);
                handler.do_store(&mut flushed[idx])?;
            }

            match handler.check_consistency(markers) {
                Ok(Consistency::Inconsistent { file }) => {
                    consistent = false;
                    warn!("File {} inconsistent", file);
                    warn!("{}", call_trace(&flushed, &seq));
                }
                Ok(Consistency::Consistent) => {}
                // a checker killed by the same signal gave no verdict
                Err(ReplayError::Checker(CheckerError::Terminated { .. })) if raised(interrupt) => {}
                Err(err) => return Err(err),
            }

            for &idx in seq.iter().rev() {
                handler.do_revert(&flushed[idx])?;
            }

            if raised(interrupt) {
                warn!("interrupted after sequence {}", i);
                return Err(ReplayError::Interrupted);
            }
        }
    }

    for store in &mut flushed {
        runtime.handler.do_store(store)?;
    }
    Ok(consistent)
}

fn call_trace(stores: &[Store], seq: &[usize]) -> String {
    let mut out = String::from("Call trace:\n");
    for (num, &idx) in seq.iter().enumerate() {
        let _ = write!(out, "Store [{}]:\n{}", num, stores[idx].trace);
    }
    out
}
