//! Exit status of the pmreorder binary on small traces.

#![cfg(unix)]

use std::io::Write;
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

struct Fixture {
    _dir: TempDir,
    trace: std::path::PathBuf,
    pool: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = dir.path().join("pool");
    std::fs::write(&pool, [0u8; 64]).unwrap();

    let mut trace = NamedTempFile::new_in(dir.path()).unwrap();
    write!(
        trace,
        "START|REGISTER_FILE;{};1000;40;0|STORE;1000;ff;1|FLUSH;1000;1|FENCE|STOP",
        pool.display()
    )
    .unwrap();
    let (_, trace) = trace.keep().unwrap();

    Fixture {
        _dir: dir,
        trace,
        pool,
    }
}

fn pmreorder(fixture: &Fixture, checker: &str, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pmreorder"))
        .arg("-l")
        .arg(&fixture.trace)
        .args(["-p", checker, "-r", "ReorderFull"])
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn consistent_run_exits_zero() {
    let fixture = fixture();
    // `false` exits 1, which reads as consistent
    let out = pmreorder(&fixture, "false", &[]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(std::fs::read(&fixture.pool).unwrap()[0], 0xff);
}

#[test]
fn inconsistent_run_exits_one() {
    let fixture = fixture();
    let out = pmreorder(&fixture, "true", &[]);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Call trace:"));
    assert!(stdout.contains("Store [0]:"));
}

#[test]
fn polarity_flag_flips_verdict() {
    let fixture = fixture();
    let out = pmreorder(&fixture, "true", &["--checker-polarity", "zero-consistent"]);
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn log_output_to_file() {
    let fixture = fixture();
    let log = fixture.trace.with_extension("out");
    let out = pmreorder(
        &fixture,
        "true",
        &["-o", log.to_str().unwrap(), "-e", "info"],
    );
    assert_eq!(out.status.code(), Some(1));
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Call trace:"));
    assert!(!text.contains('\u{1b}'));
}

#[test]
fn missing_checker_program_is_fatal() {
    let fixture = fixture();
    let out = pmreorder(&fixture, "/nonexistent/pmreorder-checker", &[]);
    assert!(!out.status.success());
    assert_ne!(out.status.code(), Some(0));
}
