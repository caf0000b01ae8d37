//! Error types for scriptcite

use thiserror::Error;

/// Result type alias for scriptcite operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scriptcite operations
#[derive(Error, Debug)]
pub enum Error {
    /// The embedding provider failed to produce a vector
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The object store failed to list, read or write
    #[error("store error: {0}")]
    Store(String),

    /// Two vectors that must share a dimensionality do not
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The caller cancelled the operation before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failed to encode a record
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same call later may succeed.
    ///
    /// Provider and storage failures are transient service errors. Everything
    /// else is a contract violation or a caller decision.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Store(_))
    }
}
