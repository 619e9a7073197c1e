//! Marker name to reorder engine table.
//!
//! Accepted sources:
//! - a JSON object `{"TX_ALLOC": "ReorderFull", "LOG": "NoReorderNoCheck"}`,
//!   inline or stored in a file;
//! - an inline list `TX_ALLOC=ReorderFull,LOG=NoReorderNoCheck`.

use crate::engine::EngineKind;
use crate::error::{LogError, LogResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Marker name to engine mapping, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerTable {
    entries: IndexMap<String, EngineKind>,
}

impl MarkerTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>, engine: EngineKind) -> Self {
        self.entries.insert(marker.into(), engine);
        self
    }

    /// Engine for a marker name
    #[must_use]
    pub fn get(&self, marker: &str) -> Option<EngineKind> {
        self.entries.get(marker).copied()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, EngineKind)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Parse a JSON object or an inline `NAME=ENGINE,...` list.
    ///
    /// # Errors
    ///
    /// Returns `LogError::InvalidMarkerTable` for malformed input and
    /// `LogError::UnsupportedEngine` for unknown engine names.
    pub fn parse(text: &str) -> LogResult<Self> {
        let text = text.trim();
        if text.starts_with('{') {
            let raw: IndexMap<String, String> = serde_json::from_str(text)?;
            return Self::from_pairs(raw);
        }

        let mut raw = IndexMap::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (marker, engine) =
                entry
                    .split_once('=')
                    .ok_or_else(|| LogError::InvalidMarkerTable {
                        reason: format!("expected NAME=ENGINE, got {:?}", entry),
                    })?;
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(LogError::InvalidMarkerTable {
                    reason: format!("empty marker name in {:?}", entry),
                });
            }
            raw.insert(marker.to_string(), engine.trim().to_string());
        }
        Self::from_pairs(raw)
    }

    /// Load from a JSON file if `source` names an existing file, otherwise
    /// parse `source` itself.
    ///
    /// # Errors
    ///
    /// Returns `LogError::Io` if the file cannot be read, plus any error of
    /// [`MarkerTable::parse`].
    pub fn load(source: &str) -> LogResult<Self> {
        let path = Path::new(source);
        if path.is_file() {
            let text = std::fs::read_to_string(path).map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!("marker table loaded from {}", path.display());
            return Self::parse(&text);
        }
        Self::parse(source)
    }

    fn from_pairs(raw: IndexMap<String, String>) -> LogResult<Self> {
        let mut entries = IndexMap::with_capacity(raw.len());
        for (marker, engine) in raw {
            entries.insert(marker, engine.parse::<EngineKind>()?);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_inline() {
        let table = MarkerTable::parse("A=ReorderFull, B = NoReorderDoCheck").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A"), Some(EngineKind::ReorderFull));
        assert_eq!(table.get("B"), Some(EngineKind::NoReorderDoCheck));
        assert_eq!(table.get("C"), None);
    }

    #[test]
    fn test_parse_json_preserves_order() {
        let table =
            MarkerTable::parse(r#"{"Z": "ReorderPartial", "A": "ReorderAccumulative"}"#).unwrap();
        let names: Vec<_> = table.iter().map(|(m, _)| m).collect();
        assert_eq!(names, vec!["Z", "A"]);
    }

    #[test]
    fn test_parse_unknown_engine() {
        let err = MarkerTable::parse("A=Sideways").unwrap_err();
        assert!(matches!(err, LogError::UnsupportedEngine { ref name } if name == "Sideways"));
    }

    #[test]
    fn test_parse_missing_separator() {
        assert!(matches!(
            MarkerTable::parse("JUSTANAME"),
            Err(LogError::InvalidMarkerTable { .. })
        ));
    }

    #[test]
    fn test_parse_bad_json() {
        assert!(matches!(
            MarkerTable::parse("{\"A\": 3}"),
            Err(LogError::InvalidMarkerTable { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"TX": "ReorderFull"}}"#).unwrap();
        let table = MarkerTable::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(table.get("TX"), Some(EngineKind::ReorderFull));
    }

    #[test]
    fn test_load_falls_back_to_inline() {
        let table = MarkerTable::load("TX=ReorderDefault").unwrap();
        assert_eq!(table.get("TX"), Some(EngineKind::ReorderDefault));
    }
}
