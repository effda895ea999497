//! Error types for mnemos-core.

use thiserror::Error;

/// Result type alias using mnemos-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for memory operations.
///
/// Lookup misses are never errors; they surface as `None`. Per-entry failures
/// inside lifecycle batches are recorded in the batch report instead.
#[derive(Error, Debug)]
pub enum Error {
    // Adapter errors
    #[error("{adapter} unavailable: {message}")]
    AdapterUnavailable { adapter: String, message: String },

    // Configuration / construction errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Embedding errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    // Database errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error for an external store that could not be reached
    pub fn adapter_unavailable(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterUnavailable {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this error came from an unreachable adapter
    pub fn is_adapter_unavailable(&self) -> bool {
        matches!(self, Self::AdapterUnavailable { .. })
    }

    /// Check if this error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
