//! Errors raised while reading and parsing a trace.

use std::path::PathBuf;

/// Log result type
pub type LogResult<T> = Result<T, LogError>;

/// Trace parsing errors. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Unknown token that is not a `.BEGIN`/`.END` marker either
    #[error("Incorrect marker format {marker}, suffix is missing")]
    IncorrectMarkerFormat {
        /// The offending token
        marker: String,
    },

    /// `.END` does not close the innermost open scope
    #[error("Cannot cross markers: {open}, {close}")]
    CrossedMarkers {
        /// Label of the innermost open scope
        open: String,
        /// Label being closed
        close: String,
    },

    /// Engine name not in the engine table
    #[error("Not supported reorder engine: {name}")]
    UnsupportedEngine {
        /// Requested engine name
        name: String,
    },

    /// Record with missing or invalid fields
    #[error("Malformed record {record:?}: {reason}")]
    MalformedRecord {
        /// The raw record
        record: String,
        /// What is wrong with it
        reason: String,
    },

    /// Marker table could not be parsed
    #[error("Invalid marker table: {reason}")]
    InvalidMarkerTable {
        /// What is wrong with it
        reason: String,
    },

    /// Reading a file failed
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl LogError {
    pub(crate) fn malformed(record: &str, err: impl std::fmt::Display) -> Self {
        Self::MalformedRecord {
            record: record.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMarkerTable {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmreorder_core::CoreError;

    #[test]
    fn test_marker_errors_display() {
        let err = LogError::IncorrectMarkerFormat {
            marker: "FOO".to_string(),
        };
        assert_eq!(err.to_string(), "Incorrect marker format FOO, suffix is missing");

        let err = LogError::CrossedMarkers {
            open: "A".to_string(),
            close: "B".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot cross markers: A, B");
    }

    #[test]
    fn test_malformed_from_core_error() {
        let err = LogError::malformed(
            "STORE;zz;1;1",
            CoreError::InvalidNumber {
                field: "address".to_string(),
                value: "zz".to_string(),
            },
        );
        let s = err.to_string();
        assert!(s.contains("STORE;zz;1;1"));
        assert!(s.contains("address"));
    }
}
