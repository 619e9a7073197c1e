//! pmreorder core types
//!
//! This crate contains pure types and logic with no I/O beyond querying the
//! host page size. Everything above it (trace parsing, replay) builds on the
//! address-range model defined here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fields;
pub mod page;
pub mod range;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use fields::{format_value, parse_hex_u64, parse_store_value, MAX_STORE_SIZE};
pub use page::{page_size, page_span};
pub use range::{contains, range_cmp, AddressRange, Rangeable};
