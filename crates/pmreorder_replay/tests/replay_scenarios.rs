//! End-to-end replays of small traces against temporary pool files.

use pmreorder_log::{EngineKind, MarkerTable, OperationsLog};
use pmreorder_replay::{
    CheckerError, CheckerPolarity, ConsistencyChecker, EngineSpec, OpsContext, ReorderConfig,
    ReplayError,
};
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Log sink shared between the subscriber and the test
#[derive(Debug, Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Judges the first byte of the file and records what it saw
#[derive(Debug, Clone, Default)]
struct FirstByte {
    bad: Option<u8>,
    seen: Rc<RefCell<Vec<(u8, String)>>>,
}

impl ConsistencyChecker for FirstByte {
    fn describe(&self) -> String {
        "first-byte".to_string()
    }

    fn check_consistency(&self, file: &Path, markers: &str) -> Result<i32, CheckerError> {
        let byte = std::fs::read(file).unwrap()[0];
        self.seen.borrow_mut().push((byte, markers.to_string()));
        Ok(i32::from(self.bad != Some(byte)))
    }
}

fn pool(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&vec![0u8; len]).unwrap();
    file.flush().unwrap();
    file
}

fn trace(file: &NamedTempFile, size: u64, body: &str) -> String {
    format!(
        "START|REGISTER_FILE;{};1000;{:x};0|{}|STOP",
        file.path().display(),
        size,
        body
    )
}

fn run(
    text: &str,
    markers: MarkerTable,
    engine: EngineSpec,
    checker: &FirstByte,
) -> Result<bool, ReplayError> {
    let config = ReorderConfig::default()
        .with_default_engine(engine)
        .with_markers(markers.clone())
        .with_seed(42);
    let log = OperationsLog::parse(text, markers)?;
    OpsContext::from_log(log, &config, Box::new(checker.clone())).run()
}

#[test]
fn single_store_full_reorder_consistent() {
    let file = pool(16);
    let checker = FirstByte::default();
    let text = trace(&file, 16, "STORE;1000;ff;1;main at t.c:1|FLUSH;1000;1|FENCE");

    assert!(run(&text, MarkerTable::new(), EngineSpec::Full, &checker).unwrap());
    assert_eq!(std::fs::read(file.path()).unwrap()[0], 0xff);
    // empty sequence, then the store alone
    let seen: Vec<u8> = checker.seen.borrow().iter().map(|(b, _)| *b).collect();
    assert_eq!(seen, vec![0x00, 0xff]);
}

#[test]
fn inconsistent_sequence_fails_run() {
    let file = pool(16);
    let checker = FirstByte {
        bad: Some(0x00),
        ..Default::default()
    };
    let text = trace(&file, 16, "STORE;1000;ff;1;pool_write at p.c:12|FLUSH;1000;1|FENCE");

    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let consistent = tracing::subscriber::with_default(subscriber, || {
        run(&text, MarkerTable::new(), EngineSpec::Full, &checker)
    })
    .unwrap();

    assert!(!consistent);
    assert_eq!(std::fs::read(file.path()).unwrap()[0], 0xff);
    let logged = sink.text();
    assert!(logged.contains("inconsistent"));
    assert!(logged.contains("Call trace:"));
}

#[test]
fn inconsistency_trace_lists_every_store() {
    let file = pool(16);
    let checker = FirstByte {
        bad: Some(0x01),
        ..Default::default()
    };
    let text = trace(
        &file,
        16,
        "STORE;1000;01;1;first at a.c:1|STORE;1001;02;1;second at a.c:2|FLUSH;1000;2|FENCE",
    );

    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let consistent = tracing::subscriber::with_default(subscriber, || {
        run(&text, MarkerTable::new(), EngineSpec::NoReorder, &checker)
    })
    .unwrap();

    assert!(!consistent);
    let logged = sink.text();
    assert!(logged.contains("Store [0]:\n    first at a.c:1"));
    assert!(logged.contains("Store [1]:\n    second at a.c:2"));
}

#[test]
fn speculation_leaves_no_trace() {
    let body = "STORE;1000;11;1|STORE;1001;22;1|STORE;1002;33;1|FLUSH;1000;3|FENCE|\
                STORE;1000;44;1|STORE;1008;55;1|FLUSH;1000;1|FENCE|FLUSH;1008;1|FENCE";

    let checked = pool(32);
    run(
        &trace(&checked, 32, body),
        MarkerTable::new(),
        EngineSpec::Full,
        &FirstByte::default(),
    )
    .unwrap();

    let plain = pool(32);
    run(
        &trace(&plain, 32, body),
        MarkerTable::new(),
        EngineSpec::NoChecker,
        &FirstByte::default(),
    )
    .unwrap();

    let checked = std::fs::read(checked.path()).unwrap();
    assert_eq!(checked, std::fs::read(plain.path()).unwrap());
    assert_eq!(&checked[..3], &[0x44, 0x22, 0x33]);
    assert_eq!(checked[8], 0x55);
}

#[test]
fn marker_scopes_select_engine() {
    let file = pool(8);
    let checker = FirstByte::default();
    let markers = MarkerTable::new().with_marker("TX", EngineKind::NoReorderDoCheck);
    // outside the marker the default engine never checks
    let body = "STORE;1000;01;1|FLUSH;1000;1|FENCE|\
                TX.BEGIN|STORE;1000;02;1|FLUSH;1000;1|FENCE|TX.END|\
                STORE;1000;03;1|FLUSH;1000;1|FENCE";

    assert!(run(&trace(&file, 8, body), markers, EngineSpec::NoChecker, &checker).unwrap());

    let seen = checker.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (0x02, "TX.BEGIN".to_string()));
    assert_eq!(std::fs::read(file.path()).unwrap()[0], 0x03);
}

#[test]
fn nested_markers_restore_outer_engine() {
    let file = pool(8);
    let checker = FirstByte::default();
    let markers = MarkerTable::new()
        .with_marker("OUTER", EngineKind::NoReorderDoCheck)
        .with_marker("INNER", EngineKind::NoReorderNoCheck);
    let body = "OUTER.BEGIN|INNER.BEGIN|STORE;1000;01;1|FLUSH;1000;1|FENCE|INNER.END|\
                STORE;1000;02;1|FLUSH;1000;1|FENCE|OUTER.END";

    assert!(run(&trace(&file, 8, body), markers, EngineSpec::NoChecker, &checker).unwrap());

    let seen = checker.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        (0x02, "OUTER.BEGIN|INNER.BEGIN|INNER.END".to_string())
    );
}

#[test]
fn crossed_markers_rejected() {
    let file = pool(8);
    let text = trace(&file, 8, "A.BEGIN|B.BEGIN|A.END|B.END");
    let err = run(&text, MarkerTable::new(), EngineSpec::Full, &FirstByte::default()).unwrap_err();
    assert!(matches!(err, ReplayError::Log(_)));
}

#[test]
fn store_past_registered_window_is_fatal() {
    let file = pool(16);
    let text = trace(&file, 2, "STORE;1001;aabb;2|FLUSH;1000;4|FENCE");
    let err = run(&text, MarkerTable::new(), EngineSpec::Full, &FirstByte::default()).unwrap_err();
    assert!(matches!(
        err,
        ReplayError::NoSuitableFile {
            address: 0x1001,
            size: 2
        }
    ));
}

#[test]
fn zero_means_consistent_polarity() {
    let file = pool(8);
    let text = trace(&file, 8, "STORE;1000;ff;1|FLUSH;1000;1|FENCE");
    let markers = MarkerTable::new();
    let config = ReorderConfig::default()
        .with_default_engine(EngineSpec::NoReorder)
        .with_polarity(CheckerPolarity::ZeroIsConsistent)
        .with_seed(1);
    // returns 1 for every file, which this polarity reads as inconsistent
    let checker = FirstByte::default();
    let log = OperationsLog::parse(&text, markers).unwrap();
    let consistent = OpsContext::from_log(log, &config, Box::new(checker))
        .run()
        .unwrap();
    assert!(!consistent);
}

#[test]
fn records_outside_window_ignored() {
    let file = pool(8);
    let text = format!(
        "STORE;1000;ff;1|{}|STORE;1000;ee;1|FLUSH;1000;1|FENCE",
        trace(&file, 8, "FENCE")
    );
    assert!(run(&text, MarkerTable::new(), EngineSpec::Full, &FirstByte::default()).unwrap());
    assert_eq!(std::fs::read(file.path()).unwrap()[0], 0x00);
}

#[test]
fn random_partial_is_reproducible() {
    let body = "STORE;1000;01;1|STORE;1001;02;1|STORE;1002;03;1|STORE;1003;04;1|\
                FLUSH;1000;4|FENCE";
    let mut runs = Vec::new();
    for _ in 0..2 {
        let file = pool(8);
        let checker = FirstByte::default();
        run(
            &trace(&file, 8, body),
            MarkerTable::new(),
            EngineSpec::RandomPartial { max_seq: 3 },
            &checker,
        )
        .unwrap();
        let seen: Vec<u8> = checker.seen.borrow().iter().map(|(b, _)| *b).collect();
        assert_eq!(seen.len(), 3);
        runs.push(seen);
    }
    assert_eq!(runs[0], runs[1]);
}
