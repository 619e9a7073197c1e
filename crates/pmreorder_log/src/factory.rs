//! Record to operation factory.
//!
//! Each record is `;`-separated with the record kind first. Known kinds are
//! dispatched through a static table; any other leading token is a user
//! marker and must end in `.BEGIN` or `.END`. Markers open and close engine
//! scopes which must nest like brackets:
//!
//! ```text
//! OK:                    NOT OK:
//!   MACRO1.BEGIN           MACRO1.BEGIN
//!     MACRO2.BEGIN           MACRO2.BEGIN
//!     MACRO2.END           MACRO1.END
//!   MACRO1.END               MACRO2.END
//! ```

use crate::engine::EngineKind;
use crate::error::{LogError, LogResult};
use crate::markers::MarkerTable;
use crate::operation::{Flush, MemoryOperation, RegisterFile, ReorderMarker, StackTrace, Store};
use pmreorder_core::{parse_hex_u64, parse_store_value, AddressRange};

/// Suffix of a marker opening a scope
pub const BEGIN_SUFFIX: &str = ".BEGIN";
/// Suffix of a marker closing a scope
pub const END_SUFFIX: &str = ".END";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Store,
    Flush,
    Fence,
    RegisterFile,
    Engine(EngineKind),
}

const RECORD_TABLE: &[(&str, RecordKind)] = &[
    ("STORE", RecordKind::Store),
    ("FLUSH", RecordKind::Flush),
    ("FENCE", RecordKind::Fence),
    ("REGISTER_FILE", RecordKind::RegisterFile),
];

impl RecordKind {
    fn lookup(token: &str) -> Option<Self> {
        RECORD_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, kind)| *kind)
            .or_else(|| EngineKind::lookup(token).map(RecordKind::Engine))
    }
}

/// Stack of open marker scopes and the engine each one selected.
///
/// The bottom entry is the unnamed top-level scope running the configured
/// default engine; it can never be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStack {
    entries: Vec<(String, EngineKind)>,
}

impl EngineStack {
    /// Stack holding only the top-level scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![(String::new(), EngineKind::ReorderDefault)],
        }
    }

    /// Innermost scope
    #[must_use]
    pub fn top(&self) -> (&str, EngineKind) {
        self.entries
            .last()
            .map(|(label, kind)| (label.as_str(), *kind))
            .unwrap_or(("", EngineKind::ReorderDefault))
    }

    /// Number of open scopes, including the top-level one
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, label: &str, kind: EngineKind) {
        self.entries.push((label.to_string(), kind));
    }

    fn pop_matching(&mut self, closing: &str) -> LogResult<()> {
        let (open, _) = self.top();
        let open = open.strip_suffix(BEGIN_SUFFIX).unwrap_or(open);
        let close = closing.strip_suffix(END_SUFFIX).unwrap_or(closing);
        if self.entries.len() <= 1 || open != close {
            return Err(LogError::CrossedMarkers {
                open: open.to_string(),
                close: close.to_string(),
            });
        }
        self.entries.pop();
        Ok(())
    }
}

impl Default for EngineStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses records into operations, tracking marker scopes
#[derive(Debug, Clone)]
pub struct OperationFactory {
    markers: MarkerTable,
    stack: EngineStack,
}

impl OperationFactory {
    /// Create a factory resolving user markers through `markers`
    #[must_use]
    pub fn new(markers: MarkerTable) -> Self {
        Self {
            markers,
            stack: EngineStack::new(),
        }
    }

    /// Current scope stack
    #[must_use]
    pub fn stack(&self) -> &EngineStack {
        &self.stack
    }

    /// Whether a leading token is a user marker rather than a known kind
    #[must_use]
    pub fn is_user_marker(token: &str) -> bool {
        RecordKind::lookup(token).is_none()
    }

    /// Parse one record.
    ///
    /// # Errors
    ///
    /// Returns `LogError::IncorrectMarkerFormat` for unknown tokens without a
    /// scope suffix, `LogError::CrossedMarkers` for badly nested scopes, and
    /// `LogError::MalformedRecord` for records with bad fields.
    pub fn create_operation(&mut self, record: &str) -> LogResult<MemoryOperation> {
        let fields: Vec<&str> = record.split(';').map(str::trim).collect();
        let token = fields.first().copied().unwrap_or_default();

        match RecordKind::lookup(token) {
            Some(RecordKind::Store) => parse_store(record, &fields),
            Some(RecordKind::Flush) => parse_flush(record, &fields),
            Some(RecordKind::Fence) => Ok(MemoryOperation::Fence),
            Some(RecordKind::RegisterFile) => parse_register_file(record, &fields),
            Some(RecordKind::Engine(kind)) => Ok(MemoryOperation::ReorderMarker(ReorderMarker {
                kind,
                label: token.to_string(),
            })),
            None => self.user_marker(token),
        }
    }

    fn user_marker(&mut self, token: &str) -> LogResult<MemoryOperation> {
        let kind = if token.ends_with(BEGIN_SUFFIX) {
            let name = token.split('.').next().unwrap_or(token);
            let kind = self
                .markers
                .get(name)
                .unwrap_or_else(|| self.stack.top().1);
            self.stack.push(token, kind);
            kind
        } else if token.ends_with(END_SUFFIX) {
            self.stack.pop_matching(token)?;
            self.stack.top().1
        } else {
            return Err(LogError::IncorrectMarkerFormat {
                marker: token.to_string(),
            });
        };

        tracing::debug!("marker {} selects {} (depth {})", token, kind, self.stack.depth());
        Ok(MemoryOperation::ReorderMarker(ReorderMarker {
            kind,
            label: token.to_string(),
        }))
    }
}

fn field<'a>(record: &str, fields: &[&'a str], index: usize, name: &str) -> LogResult<&'a str> {
    fields
        .get(index)
        .copied()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| LogError::malformed(record, format!("missing {} field", name)))
}

fn hex_field(record: &str, fields: &[&str], index: usize, name: &str) -> LogResult<u64> {
    parse_hex_u64(name, field(record, fields, index, name)?)
        .map_err(|err| LogError::malformed(record, err))
}

fn checked_range(record: &str, address: u64, size: u64) -> LogResult<AddressRange> {
    AddressRange::new(address, size).map_err(|err| LogError::malformed(record, err))
}

fn parse_store(record: &str, fields: &[&str]) -> LogResult<MemoryOperation> {
    let address = hex_field(record, fields, 1, "address")?;
    let size = hex_field(record, fields, 3, "size")?;
    checked_range(record, address, size)?;
    let value = parse_store_value(field(record, fields, 2, "value")?, size)
        .map_err(|err| LogError::malformed(record, err))?;
    let frames = fields
        .iter()
        .skip(4)
        .filter(|f| !f.is_empty())
        .map(|f| f.to_string())
        .collect();
    Ok(MemoryOperation::Store(Store::new(
        address,
        value,
        StackTrace::new(frames),
    )))
}

fn parse_flush(record: &str, fields: &[&str]) -> LogResult<MemoryOperation> {
    let address = hex_field(record, fields, 1, "address")?;
    let size = hex_field(record, fields, 2, "size")?;
    checked_range(record, address, size)?;
    Ok(MemoryOperation::Flush(Flush { address, size }))
}

fn parse_register_file(record: &str, fields: &[&str]) -> LogResult<MemoryOperation> {
    let name = field(record, fields, 1, "name")?.to_string();
    let address = hex_field(record, fields, 2, "address")?;
    let size = hex_field(record, fields, 3, "size")?;
    let offset = hex_field(record, fields, 4, "offset")?;
    checked_range(record, address, size)?;
    Ok(MemoryOperation::RegisterFile(RegisterFile {
        name,
        address,
        size,
        offset,
    }))
}
