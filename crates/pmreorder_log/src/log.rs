//! Extraction of the operation sequence from a raw trace.

use crate::error::{LogError, LogResult};
use crate::factory::OperationFactory;
use crate::markers::MarkerTable;
use crate::operation::MemoryOperation;
use serde::{Deserialize, Serialize};
use std::path::Path;

const START: &str = "START";
const STOP: &str = "STOP";

/// A user marker and the index of the operation it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Index into [`OperationsLog::operations`]
    pub index: usize,
    /// Marker token, e.g. `TX_ADD.BEGIN`
    pub label: String,
}

/// Parsed operations between `START` and `STOP`, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsLog {
    operations: Vec<MemoryOperation>,
    markers: Vec<MarkerRecord>,
}

impl OperationsLog {
    /// Parse a raw trace.
    ///
    /// Records are separated by `|`. Only records inside a `START`..`STOP`
    /// window are parsed; a missing `STOP` extends the window to the end.
    ///
    /// # Errors
    ///
    /// Returns the first parse error encountered.
    pub fn parse(text: &str, markers: MarkerTable) -> LogResult<Self> {
        let mut factory = OperationFactory::new(markers);
        let mut operations = Vec::new();
        let mut marker_records = Vec::new();
        let mut recording = false;

        for record in text.split('|').map(str::trim).filter(|r| !r.is_empty()) {
            if record == START {
                recording = true;
                continue;
            }
            if record == STOP {
                recording = false;
                continue;
            }
            if !recording {
                continue;
            }

            let token = record.split(';').next().unwrap_or_default().trim();
            let operation = factory.create_operation(record)?;
            if OperationFactory::is_user_marker(token) {
                marker_records.push(MarkerRecord {
                    index: operations.len(),
                    label: token.to_string(),
                });
            }
            operations.push(operation);
        }

        if operations.is_empty() {
            tracing::warn!("trace contains no operations between {} and {}", START, STOP);
        }

        Ok(Self {
            operations,
            markers: marker_records,
        })
    }

    /// Read and parse a trace file.
    ///
    /// # Errors
    ///
    /// Returns `LogError::Io` if the file cannot be read, or a parse error.
    pub fn read(path: &Path, markers: MarkerTable) -> LogResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let log = Self::parse(&text, markers)?;
        tracing::info!(
            "parsed {} operations ({} markers) from {}",
            log.len(),
            log.markers.len(),
            path.display()
        );
        Ok(log)
    }

    /// Build a log from already parsed operations
    #[must_use]
    pub fn from_operations(operations: Vec<MemoryOperation>) -> Self {
        Self {
            operations,
            markers: Vec::new(),
        }
    }

    /// All operations in trace order
    #[must_use]
    pub fn operations(&self) -> &[MemoryOperation] {
        &self.operations
    }

    /// User markers in trace order
    #[must_use]
    pub fn markers(&self) -> &[MarkerRecord] {
        &self.markers
    }

    /// Labels of the markers preceding operation `index`, `|`-joined
    #[must_use]
    pub fn markers_before(&self, index: usize) -> String {
        self.markers
            .iter()
            .take_while(|m| m.index < index)
            .map(|m| m.label.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Number of operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether there are no operations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
