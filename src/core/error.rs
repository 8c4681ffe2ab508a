//! Error types for the dual-ledger audit engine.

use thiserror::Error;

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while recording or verifying audit events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Caller input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    // Ledger errors
    #[error("Ledger {ledger} unavailable: {reason}")]
    LedgerUnavailable { ledger: String, reason: String },

    #[error("Submission to {ledger} timed out after {timeout_ms}ms")]
    SubmissionTimeout { ledger: String, timeout_ms: u64 },

    #[error("Rejected by ledger {ledger}: {reason}")]
    RejectedByLedger { ledger: String, reason: String },

    #[error("Hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: String, found: String },

    // Store errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Transient ledger faults that the retry policy absorbs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LedgerUnavailable { .. } | Error::SubmissionTimeout { .. }
        )
    }

    /// Short machine-readable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Encoding(_) => "encoding",
            Error::LedgerUnavailable { .. } => "ledger_unavailable",
            Error::SubmissionTimeout { .. } => "submission_timeout",
            Error::RejectedByLedger { .. } => "rejected_by_ledger",
            Error::HashMismatch { .. } => "hash_mismatch",
            Error::NotFound(_) => "not_found",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        Error::Internal(format!("signature error: {}", err))
    }
}
