//! Replay configuration and the top-level run.

use crate::binary::BinaryOutputHandler;
use crate::checker::{CheckerPolarity, ConsistencyChecker};
use crate::engines::EngineSpec;
use crate::error::ReplayResult;
use crate::state::{ReplayRuntime, StateMachine};
use pmreorder_log::{MarkerTable, OperationsLog};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderConfig {
    /// Trace file to replay
    pub log_file: PathBuf,
    /// Engine used outside any marker and restored by `ReorderDefault`
    pub default_engine: EngineSpec,
    /// User marker to engine table
    pub markers: MarkerTable,
    /// How checker results are read
    pub polarity: CheckerPolarity,
    /// Seed for random engines; drawn from entropy when unset
    pub seed: Option<u64>,
}

impl ReorderConfig {
    /// Config replaying `log_file` with defaults for everything else
    #[must_use]
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            ..Self::default()
        }
    }

    /// Set the default engine
    #[must_use]
    pub fn with_default_engine(mut self, engine: EngineSpec) -> Self {
        self.default_engine = engine;
        self
    }

    /// Set the marker table
    #[must_use]
    pub fn with_markers(mut self, markers: MarkerTable) -> Self {
        self.markers = markers;
        self
    }

    /// Set the checker polarity
    #[must_use]
    pub fn with_polarity(mut self, polarity: CheckerPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Fix the random seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::new(),
            default_engine: EngineSpec::default(),
            markers: MarkerTable::new(),
            polarity: CheckerPolarity::default(),
            seed: None,
        }
    }
}

/// A parsed trace bound to a checker, ready to run
pub struct OpsContext {
    log: OperationsLog,
    runtime: ReplayRuntime,
    interrupt: Option<Arc<AtomicBool>>,
}

impl OpsContext {
    /// Read and parse `config.log_file`.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Log` if the trace cannot be read or parsed.
    pub fn open(config: ReorderConfig, checker: Box<dyn ConsistencyChecker>) -> ReplayResult<Self> {
        let log = OperationsLog::read(&config.log_file, config.markers.clone())?;
        Ok(Self::from_log(log, &config, checker))
    }

    /// Bind an already parsed trace
    #[must_use]
    pub fn from_log(
        log: OperationsLog,
        config: &ReorderConfig,
        checker: Box<dyn ConsistencyChecker>,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(
            "replaying {} operations, default engine {:?}, checker {}, seed {}",
            log.len(),
            config.default_engine,
            checker.describe(),
            seed
        );

        let handler = BinaryOutputHandler::new(checker, config.polarity);
        let runtime = ReplayRuntime::new(
            handler,
            config.default_engine,
            ChaCha8Rng::seed_from_u64(seed),
        );
        Self {
            log,
            runtime,
            interrupt: None,
        }
    }

    /// Stop between operations once `flag` is raised
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Parsed trace
    #[must_use]
    pub fn log(&self) -> &OperationsLog {
        &self.log
    }

    /// Replay state, including the mapped files
    #[must_use]
    pub fn runtime(&self) -> &ReplayRuntime {
        &self.runtime
    }

    /// Replay the whole trace.
    ///
    /// Returns `true` when every checked sequence was consistent.
    ///
    /// # Errors
    ///
    /// Returns the first fatal replay error.
    pub fn run(&mut self) -> ReplayResult<bool> {
        let mut machine = StateMachine::new();
        let consistent = machine.run_all(&mut self.runtime, &self.log, self.interrupt.as_deref())?;
        if !machine.carried().is_empty() {
            info!("{} stores were never flushed", machine.carried().len());
        }
        Ok(consistent)
    }
}

impl std::fmt::Debug for OpsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsContext")
            .field("operations", &self.log.len())
            .field("runtime", &self.runtime)
            .finish()
    }
}
