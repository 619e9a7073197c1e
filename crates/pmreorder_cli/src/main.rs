//! pmreorder CLI
//!
//! Replays a persistent-memory store trace under the selected reorder engines
//! and reports whether every checked ordering left the files consistent.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use pmreorder_log::MarkerTable;
use pmreorder_replay::{
    CheckerPolarity, ConsistencyChecker, EngineSpec, LibChecker, OpsContext, ProgChecker,
    ReorderConfig, ReplayError,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

/// Exit status after SIGINT
const INTERRUPTED_EXIT: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "pmreorder")]
#[command(about = "Store reordering tool for persistent memory crash-consistency testing", long_about = None)]
struct Cli {
    /// Trace file produced by the store logger
    #[arg(short = 'l', long)]
    logfile: PathBuf,

    /// Checker type
    #[arg(short = 'c', long, value_enum, default_value_t = CheckerType::Prog)]
    checker: CheckerType,

    /// Checker program with arguments, or checker library path
    #[arg(short = 'p', long)]
    path: Option<String>,

    /// Checker function name (lib checker only)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Log output file; stdout when absent
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Log verbosity
    #[arg(short = 'e', long, value_enum, default_value_t = OutputLevel::Warning)]
    output_level: OutputLevel,

    /// Marker to engine table: JSON file, JSON text or NAME=ENGINE,...
    #[arg(short = 'x', long)]
    extended_macros: Option<String>,

    /// Engine used outside any marker
    #[arg(short = 'r', long, default_value = "NoReorderNoCheck")]
    default_engine: EngineSpec,

    /// Seed for ReorderPartial sampling
    #[arg(long)]
    seed: Option<u64>,

    /// How the checker's result is read
    #[arg(long, value_enum, default_value_t = Polarity::ZeroInconsistent)]
    checker_polarity: Polarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CheckerType {
    Prog,
    Lib,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<OutputLevel> for LevelFilter {
    fn from(level: OutputLevel) -> Self {
        match level {
            OutputLevel::Debug => LevelFilter::DEBUG,
            OutputLevel::Info => LevelFilter::INFO,
            OutputLevel::Warning => LevelFilter::WARN,
            OutputLevel::Error | OutputLevel::Critical => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Polarity {
    ZeroInconsistent,
    ZeroConsistent,
}

impl From<Polarity> for CheckerPolarity {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::ZeroInconsistent => CheckerPolarity::ZeroIsInconsistent,
            Polarity::ZeroConsistent => CheckerPolarity::ZeroIsConsistent,
        }
    }
}

fn init_tracing(level: OutputLevel, output: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(level))
        .with_target(false);
    match output {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("cannot create log output {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stdout).init(),
    }
    Ok(())
}

fn build_checker(cli: &Cli) -> Result<Box<dyn ConsistencyChecker>> {
    let path = cli
        .path
        .as_deref()
        .ok_or_else(|| eyre!("--path is required for the {:?} checker", cli.checker))?;
    let checker: Box<dyn ConsistencyChecker> = match cli.checker {
        CheckerType::Prog => Box::new(ProgChecker::from_command_line(path)?),
        CheckerType::Lib => {
            let name = cli
                .name
                .as_deref()
                .ok_or_else(|| eyre!("--name is required for the lib checker"))?;
            Box::new(LibChecker::open(path, name)?)
        }
    };
    Ok(checker)
}

fn build_config(cli: &Cli) -> Result<ReorderConfig> {
    let markers = match &cli.extended_macros {
        Some(source) => MarkerTable::load(source).wrap_err("invalid --extended-macros")?,
        None => MarkerTable::new(),
    };
    let mut config = ReorderConfig::new(&cli.logfile)
        .with_default_engine(cli.default_engine)
        .with_markers(markers)
        .with_polarity(cli.checker_polarity.into());
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.output_level, cli.output.as_deref())?;

    let checker = build_checker(&cli)?;
    let config = build_config(&cli)?;

    let interrupt = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt))
        .wrap_err("cannot install SIGINT handler")?;

    let mut context = OpsContext::open(config, checker)?.with_interrupt(interrupt);
    match context.run() {
        Ok(true) => {
            info!("all checked sequences consistent");
            Ok(ExitCode::SUCCESS)
        }
        Ok(false) => {
            error!("inconsistent sequences found, see warnings above");
            Ok(ExitCode::FAILURE)
        }
        Err(ReplayError::Interrupted) => {
            error!("interrupted");
            Ok(ExitCode::from(INTERRUPTED_EXIT))
        }
        Err(err) => {
            error!("{}", err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pmreorder", "-l", "trace.log", "-p", "check"]).unwrap();
        assert_eq!(cli.checker, CheckerType::Prog);
        assert_eq!(cli.output_level, OutputLevel::Warning);
        assert_eq!(cli.default_engine, EngineSpec::NoChecker);
        assert_eq!(cli.checker_polarity, Polarity::ZeroInconsistent);
        assert!(cli.seed.is_none());
    }

    #[test]
    fn test_full_flags() {
        let cli = Cli::try_parse_from([
            "pmreorder",
            "--logfile",
            "trace.log",
            "-c",
            "lib",
            "-p",
            "libcheck.so",
            "-n",
            "check",
            "-e",
            "critical",
            "-x",
            "TX=ReorderFull",
            "-r",
            "ReorderAccumulative",
            "--seed",
            "5",
            "--checker-polarity",
            "zero-consistent",
        ])
        .unwrap();
        assert_eq!(cli.checker, CheckerType::Lib);
        assert_eq!(cli.name.as_deref(), Some("check"));
        assert_eq!(LevelFilter::from(cli.output_level), LevelFilter::ERROR);
        assert_eq!(cli.default_engine, EngineSpec::Accumulative);
        assert_eq!(cli.seed, Some(5));
        assert_eq!(
            CheckerPolarity::from(cli.checker_polarity),
            CheckerPolarity::ZeroIsConsistent
        );

        let config = build_config(&cli).unwrap();
        assert_eq!(config.markers.len(), 1);
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn test_default_engine_rejects_reorder_default() {
        assert!(Cli::try_parse_from(["pmreorder", "-l", "t", "-r", "ReorderDefault"]).is_err());
        assert!(Cli::try_parse_from(["pmreorder", "-l", "t", "-r", "Bogus"]).is_err());
    }

    #[test]
    fn test_logfile_required() {
        assert!(Cli::try_parse_from(["pmreorder", "-p", "check"]).is_err());
    }

    #[test]
    fn test_checker_needs_path() {
        let cli = Cli::try_parse_from(["pmreorder", "-l", "t"]).unwrap();
        assert!(build_checker(&cli).is_err());

        let cli = Cli::try_parse_from(["pmreorder", "-l", "t", "-c", "lib", "-p", "x.so"]).unwrap();
        assert!(build_checker(&cli).is_err());
    }
}
