//! Address ranges and the overlap comparator used across the replay.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Anything that covers a half-open range of virtual addresses.
pub trait Rangeable {
    /// First address of the range
    fn base_address(&self) -> u64;

    /// First address past the end of the range
    fn max_address(&self) -> u64;

    /// Length of the range in bytes
    fn range_len(&self) -> u64 {
        self.max_address() - self.base_address()
    }
}

/// Compare two ranges.
///
/// `Less` when `lhs` ends at or before the start of `rhs`, `Greater` when it
/// starts at or after the end of `rhs`, `Equal` when the two overlap.
pub fn range_cmp<L, R>(lhs: &L, rhs: &R) -> Ordering
where
    L: Rangeable + ?Sized,
    R: Rangeable + ?Sized,
{
    if lhs.max_address() <= rhs.base_address() {
        Ordering::Less
    } else if lhs.base_address() >= rhs.max_address() {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Whether `inner` lies entirely within `outer`.
pub fn contains<O, I>(outer: &O, inner: &I) -> bool
where
    O: Rangeable + ?Sized,
    I: Rangeable + ?Sized,
{
    inner.base_address() >= outer.base_address() && inner.max_address() <= outer.max_address()
}

/// A plain `[base, base + size)` address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    /// Range start address
    pub base: u64,
    /// Range length in bytes
    pub size: u64,
}

impl AddressRange {
    /// Create a range, rejecting empty or wrapping ones.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidRange` if `size` is zero or `base + size`
    /// overflows.
    pub fn new(base: u64, size: u64) -> CoreResult<Self> {
        if size == 0 || base.checked_add(size).is_none() {
            return Err(CoreError::InvalidRange { base, size });
        }
        Ok(Self { base, size })
    }

    /// Offset of `addr` from the start of this range
    #[must_use]
    pub fn offset_of(&self, addr: u64) -> Option<u64> {
        if addr >= self.base && addr < self.base + self.size {
            Some(addr - self.base)
        } else {
            None
        }
    }
}

impl Rangeable for AddressRange {
    fn base_address(&self) -> u64 {
        self.base
    }

    fn max_address(&self) -> u64 {
        self.base + self.size
    }
}
