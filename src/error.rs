/*!
 * Error types for Custodia
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CustodiaError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

/// Errors surfaced by the traceability core.
///
/// An integrity mismatch is deliberately absent here: it is a verdict
/// returned from verification, not an error. Escalation belongs to the
/// calling context.
#[derive(Error, Debug)]
pub enum CustodiaError {
    /// Payload cannot be canonicalized; no digest or row is produced
    #[error("Serialization error: {0}")]
    Canonical(#[from] custodia_core_canonical::Error),

    /// Requested event or record does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// Durable read or write failed; the whole logical operation rolls back
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A supplied digest does not have the 64-char lowercase hex shape
    #[error("Invalid digest: {0:?}")]
    InvalidDigest(String),

    /// Stored payload text failed to parse back into a field map
    #[error("Payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CustodiaError {
    /// Create a not-found error
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        CustodiaError::NotFound { kind, id }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        // Every error here is fatal to the current operation; the
        // integrity exit code is reserved for mismatch verdicts.
        EXIT_FATAL
    }

    /// Whether the caller may retry the whole operation.
    ///
    /// Write-path callers retry the entire logical operation or not at
    /// all; they must never attempt to patch a half-written pair.
    pub fn is_retryable(&self) -> bool {
        match self {
            CustodiaError::Storage(_) | CustodiaError::Io(_) => true,
            CustodiaError::Canonical(_)
            | CustodiaError::NotFound { .. }
            | CustodiaError::InvalidDigest(_)
            | CustodiaError::Decode(_)
            | CustodiaError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = CustodiaError::not_found("event", 99);
        assert!(err.to_string().contains("event"));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_invalid_digest_message() {
        let err = CustodiaError::InvalidDigest("xyz".to_string());
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!CustodiaError::not_found("event", 1).is_retryable());
        assert!(!CustodiaError::Config("bad".into()).is_retryable());
        let io = CustodiaError::Io(std::io::Error::other("disk"));
        assert!(io.is_retryable());
    }

    #[test]
    fn test_exit_code_is_fatal() {
        assert_eq!(CustodiaError::Config("x".into()).exit_code(), EXIT_FATAL);
    }
}
