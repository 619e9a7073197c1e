//! Memory operations recorded in a trace.

use crate::engine::EngineKind;
use pmreorder_core::{format_value, Rangeable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call stack recorded with a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    /// Frames, innermost first
    pub frames: Vec<String>,
}

impl StackTrace {
    /// Build a trace from recorded frames; an empty list becomes the
    /// "No trace available" placeholder.
    #[must_use]
    pub fn new(frames: Vec<String>) -> Self {
        if frames.is_empty() {
            Self::unavailable()
        } else {
            Self { frames }
        }
    }

    /// Placeholder trace
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            frames: vec!["No trace available".to_string()],
        }
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "    {}", frame)?;
        }
        Ok(())
    }
}

/// A store of `new_value` to `[address, address + size)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Virtual address of the first byte
    pub address: u64,
    /// Size in bytes, never zero
    pub size: u64,
    /// Bytes to write, in host order
    pub new_value: Vec<u8>,
    /// Bytes found at the location by the last apply
    pub old_value: Option<Vec<u8>>,
    /// Covered by a flush before the epoch's fence
    pub flushed: bool,
    /// Where the store was issued
    pub trace: StackTrace,
}

impl Store {
    /// Create an unflushed, never-applied store
    #[must_use]
    pub fn new(address: u64, new_value: Vec<u8>, trace: StackTrace) -> Self {
        Self {
            address,
            size: new_value.len() as u64,
            new_value,
            old_value: None,
            flushed: false,
            trace,
        }
    }

    /// Mark as flushed. There is no way back.
    pub fn mark_flushed(&mut self) {
        self.flushed = true;
    }
}

impl Rangeable for Store {
    fn base_address(&self) -> u64 {
        self.address
    }

    fn max_address(&self) -> u64 {
        self.address + self.size
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store: addr: {:#x}, size: {:#x}, val: {}, stack trace:\n{}",
            self.address,
            self.size,
            format_value(&self.new_value),
            self.trace
        )
    }
}

/// A cache flush (CLFLUSH, CLFLUSHOPT, CLWB) of `[address, address + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flush {
    /// Virtual address of the flushed range
    pub address: u64,
    /// Size in bytes
    pub size: u64,
}

impl Flush {
    /// Whether flushing this range pushes `store` towards media
    #[must_use]
    pub fn covers(&self, store: &Store) -> bool {
        pmreorder_core::range_cmp(store, self) == std::cmp::Ordering::Equal
    }
}

impl Rangeable for Flush {
    fn base_address(&self) -> u64 {
        self.address
    }

    fn max_address(&self) -> u64 {
        self.address + self.size
    }
}

/// A file mapped into the traced process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    /// Path of the backing file
    pub name: String,
    /// Base address of the mapping
    pub address: u64,
    /// Mapping length in bytes
    pub size: u64,
    /// File offset the mapping starts at
    pub offset: u64,
}

impl Rangeable for RegisterFile {
    fn base_address(&self) -> u64 {
        self.address
    }

    fn max_address(&self) -> u64 {
        self.address + self.size
    }
}

/// Switch of the active reorder engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderMarker {
    /// Engine that governs the following stores
    pub kind: EngineKind,
    /// Marker token that caused the switch
    pub label: String,
}

/// One parsed trace record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryOperation {
    /// Memory store
    Store(Store),
    /// Cache flush
    Flush(Flush),
    /// Store fence (SFENCE/MFENCE)
    Fence,
    /// File registration
    RegisterFile(RegisterFile),
    /// Reorder engine switch
    ReorderMarker(ReorderMarker),
}

impl MemoryOperation {
    /// Short variant name
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Store(_) => "Store",
            Self::Flush(_) => "Flush",
            Self::Fence => "Fence",
            Self::RegisterFile(_) => "RegisterFile",
            Self::ReorderMarker(_) => "ReorderMarker",
        }
    }
}

impl fmt::Display for MemoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(store) => write!(f, "{}", store),
            Self::Flush(flush) => {
                write!(f, "Flush: addr: {:#x} size: {:#x}", flush.address, flush.size)
            }
            Self::Fence => write!(f, "Fence"),
            Self::RegisterFile(reg) => write!(
                f,
                "Register_file: name: {} addr: {:#x} size: {:#x} offset: {:#x}",
                reg.name, reg.address, reg.size, reg.offset
            ),
            Self::ReorderMarker(marker) => write!(f, "{} -- {}", marker.kind, marker.label),
        }
    }
}
