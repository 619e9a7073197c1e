//! Names of the reorder engines a marker scope can select.

use crate::error::{LogError, LogResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reorder engine selected by a marker or by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Apply all stores, skip checking
    NoReorderNoCheck,
    /// Every permutation of every subset
    ReorderFull,
    /// Apply all stores, then check
    NoReorderDoCheck,
    /// Growing prefixes
    ReorderAccumulative,
    /// Growing prefixes of the reversed list
    ReorderReverseAccumulative,
    /// Random sample of combinations
    ReorderPartial,
    /// Whatever engine the run was configured with
    ReorderDefault,
}

const ENGINE_TABLE: &[(&str, EngineKind)] = &[
    ("NoReorderNoCheck", EngineKind::NoReorderNoCheck),
    ("ReorderFull", EngineKind::ReorderFull),
    ("NoReorderDoCheck", EngineKind::NoReorderDoCheck),
    ("ReorderAccumulative", EngineKind::ReorderAccumulative),
    ("ReorderReverseAccumulative", EngineKind::ReorderReverseAccumulative),
    ("ReorderPartial", EngineKind::ReorderPartial),
    ("ReorderDefault", EngineKind::ReorderDefault),
];

impl EngineKind {
    /// All engines, in table order
    pub fn all() -> impl Iterator<Item = EngineKind> {
        ENGINE_TABLE.iter().map(|(_, kind)| *kind)
    }

    /// Canonical name as used in marker tables and on the command line
    #[must_use]
    pub fn name(self) -> &'static str {
        ENGINE_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("ReorderDefault")
    }

    /// Look a name up, exact match first, then case-insensitively.
    #[must_use]
    pub fn lookup(name: &str) -> Option<EngineKind> {
        let name = name.trim();
        ENGINE_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .or_else(|| ENGINE_TABLE.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, kind)| *kind)
    }

    /// Whether this kind names a concrete engine rather than deferring to the
    /// configured default.
    #[must_use]
    pub const fn is_concrete(self) -> bool {
        !matches!(self, Self::ReorderDefault)
    }
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::NoReorderNoCheck
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = LogError;

    fn from_str(s: &str) -> LogResult<Self> {
        Self::lookup(s).ok_or_else(|| LogError::UnsupportedEngine {
            name: s.to_string(),
        })
    }
}
