//! Page alignment of flushed spans.

use std::ffi::{c_int, c_long};
use std::sync::OnceLock;

/// Page size assumed where the host cannot be asked
const FALLBACK_PAGE_SIZE: usize = 4096;

// `_SC_PAGESIZE` from glibc and musl <bits/confname.h>
#[cfg(target_os = "linux")]
const SC_PAGESIZE: c_int = 30;
// `_SC_PAGESIZE` from <unistd.h> on Darwin and FreeBSD
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const SC_PAGESIZE: c_int = 29;

#[cfg(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
))]
unsafe extern "C" {
    fn sysconf(name: c_int) -> c_long;
}

#[cfg(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
))]
fn query_page_size() -> usize {
    // SAFETY: sysconf has no preconditions and only reads system config.
    let size = unsafe { sysconf(SC_PAGESIZE) };
    checked_page_size(size).unwrap_or(FALLBACK_PAGE_SIZE)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
fn query_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

/// A sysconf answer usable as a page size
#[cfg_attr(
    not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    )),
    allow(dead_code)
)]
fn checked_page_size(size: c_long) -> Option<usize> {
    usize::try_from(size).ok().filter(|s| s.is_power_of_two())
}

/// Host page size, queried once.
#[must_use]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(query_page_size)
}

/// Page-aligned `(start, len)` covering `[offset, offset + len)`, clipped to
/// `limit`.
#[must_use]
pub fn page_span(offset: usize, len: usize, limit: usize) -> (usize, usize) {
    let page = page_size();
    let start = offset & !(page - 1);
    let end = offset.saturating_add(len).saturating_add(page - 1) & !(page - 1);
    let end = end.min(limit);
    (start, end.saturating_sub(start))
}
