//! Error types for canonical serialization

use thiserror::Error;

/// Result type for canonicalization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while canonicalizing a payload
#[derive(Error, Debug)]
pub enum Error {
    /// A numeric field is NaN or infinite and cannot be represented
    #[error("Non-finite number in field '{field}'")]
    NonFinite { field: String },

    /// The payload nests deeper than the canonical encoder allows
    #[error("Payload nesting exceeds maximum depth of {max_depth}")]
    TooDeep { max_depth: usize },

    /// A value cannot be represented in canonical form
    #[error("Unsupported value: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a non-finite number error
    pub fn non_finite<S: Into<String>>(field: S) -> Self {
        Error::NonFinite {
            field: field.into(),
        }
    }

    /// Create an unsupported value error
    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Error::Unsupported(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_error() {
        let err = Error::non_finite("amount");
        assert!(matches!(err, Error::NonFinite { .. }));
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_too_deep_error() {
        let err = Error::TooDeep { max_depth: 64 };
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_unsupported_error() {
        let err = Error::unsupported("binary blob");
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("binary blob"));
    }
}
