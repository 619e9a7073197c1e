//! Parsing of the numeric fields of trace records.
//!
//! Addresses, sizes and offsets are hexadecimal, with or without a `0x`
//! prefix. Store values are arbitrary-width hexadecimal integers that are laid
//! out in memory in the host byte order, exactly `size` bytes wide.

use crate::error::{CoreError, CoreResult};

fn strip_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

/// Parse a hexadecimal address, size or offset field.
///
/// # Errors
///
/// Returns `CoreError::InvalidNumber` if the text is empty or not hex.
pub fn parse_hex_u64(field: &str, text: &str) -> CoreResult<u64> {
    let digits = strip_prefix(text.trim());
    u64::from_str_radix(digits, 16).map_err(|_| CoreError::InvalidNumber {
        field: field.to_string(),
        value: text.to_string(),
    })
}

/// Largest store size accepted from a trace (16 MiB)
pub const MAX_STORE_SIZE: u64 = 1 << 24;

/// Parse a store value into `size` bytes in host byte order.
///
/// # Errors
///
/// Returns `CoreError::InvalidNumber` for non-hex text,
/// `CoreError::StoreTooLarge` when `size` exceeds [`MAX_STORE_SIZE`] and
/// `CoreError::ValueTooWide` when the value needs more than `size` bytes.
pub fn parse_store_value(text: &str, size: u64) -> CoreResult<Vec<u8>> {
    if size > MAX_STORE_SIZE {
        return Err(CoreError::StoreTooLarge {
            size,
            max: MAX_STORE_SIZE,
        });
    }
    let digits = strip_prefix(text.trim());
    if digits.is_empty() {
        return Err(CoreError::InvalidNumber {
            field: "value".to_string(),
            value: text.to_string(),
        });
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let big_endian = hex::decode(&padded).map_err(|_| CoreError::InvalidNumber {
        field: "value".to_string(),
        value: text.to_string(),
    })?;

    let significant: &[u8] = match big_endian.iter().position(|b| *b != 0) {
        Some(first) => &big_endian[first..],
        None => &[],
    };

    let width = usize::try_from(size).map_err(|_| CoreError::ValueTooWide {
        value: text.to_string(),
        size,
    })?;
    if significant.len() > width {
        return Err(CoreError::ValueTooWide {
            value: text.to_string(),
            size,
        });
    }

    let mut bytes = vec![0u8; width - significant.len()];
    bytes.extend_from_slice(significant);
    if cfg!(target_endian = "little") {
        bytes.reverse();
    }
    Ok(bytes)
}

/// Render bytes laid out in host order as a `0x`-prefixed integer.
#[must_use]
pub fn format_value(bytes: &[u8]) -> String {
    let mut big_endian = bytes.to_vec();
    if cfg!(target_endian = "little") {
        big_endian.reverse();
    }
    let digits = hex::encode(big_endian);
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{}", trimmed)
    }
}
