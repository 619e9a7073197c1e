//! Core error types for pmreorder.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A numeric trace field is not valid hexadecimal
    InvalidNumber {
        /// Field name
        field: String,
        /// Offending text
        value: String,
    },

    /// A store value does not fit in the declared store size
    ValueTooWide {
        /// Offending text
        value: String,
        /// Declared size in bytes
        size: u64,
    },

    /// A store is larger than any single store the tracer emits
    StoreTooLarge {
        /// Declared size in bytes
        size: u64,
        /// Largest accepted size
        max: u64,
    },

    /// A range has zero length or wraps the address space
    InvalidRange {
        /// Base address
        base: u64,
        /// Length in bytes
        size: u64,
    },

    /// Parse error
    ParseError {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber { field, value } => {
                write!(f, "Invalid hexadecimal {}: {:?}", field, value)
            }
            Self::ValueTooWide { value, size } => {
                write!(f, "Value {} does not fit in {} byte(s)", value, size)
            }
            Self::StoreTooLarge { size, max } => {
                write!(f, "Store size {:#x} exceeds the {:#x} byte limit", size, max)
            }
            Self::InvalidRange { base, size } => {
                write!(f, "Invalid range: base {:#x}, size {:#x}", base, size)
            }
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<hex::FromHexError> for CoreError {
    fn from(err: hex::FromHexError) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidNumber {
            field: "address".to_string(),
            value: "zz".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid hexadecimal address: \"zz\"");

        let err = CoreError::ValueTooWide {
            value: "1ff".to_string(),
            size: 1,
        };
        assert_eq!(format!("{}", err), "Value 1ff does not fit in 1 byte(s)");
    }

    #[test]
    fn test_invalid_range_display() {
        let err = CoreError::InvalidRange { base: 16, size: 0 };
        let s = format!("{}", err);
        assert!(s.contains("0x10"));
        assert!(s.contains("0x0"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::ParseError {
            message: "x".to_string(),
        };
        let err2 = CoreError::ParseError {
            message: "x".to_string(),
        };
        assert_eq!(err1, err2);
        assert_ne!(err1, CoreError::InvalidRange { base: 0, size: 0 });
    }
}
