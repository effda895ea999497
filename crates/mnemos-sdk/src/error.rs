//! SDK Error Types
//!
//! Defines error types for the Mnemos SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Engine error
    #[error(transparent)]
    Core(#[from] mnemos_core::Error),

    /// Config file parse error
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Check if this error is a configuration or validation error
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Core(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Check if an external store could not be reached
    pub fn is_adapter_unavailable(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_adapter_unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_errors_are_not_validation() {
        let err: SDKError = anyhow::anyhow!("test error").into();
        assert_eq!(err.to_string(), "test error");
        assert!(!err.is_validation());
        assert!(!err.is_adapter_unavailable());
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: SDKError = mnemos_core::Error::adapter_unavailable("vector store", "timeout").into();
        assert!(err.is_adapter_unavailable());
        assert_eq!(err.to_string(), "vector store unavailable: timeout");

        let err: SDKError = mnemos_core::Error::validation("dimension mismatch").into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_config_errors_are_validation() {
        let err: SDKError = crate::config::ConfigValidationError::MissingOwnerId.into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("owner_id"));
    }
}
