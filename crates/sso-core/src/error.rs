//! Error handling for the SSO gateway core.
//!
//! Error messages are informative for operators but never include key
//! material or raw protocol payloads.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for process-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether this error is caused by the deployment rather than a caller.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Internal)
    }

    /// Returns whether this error represents a client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_server_error() {
        let error = Error::Config("SSO_IDP_ENTITY_ID is required".to_string());
        assert!(error.is_server_error());
        assert!(!error.is_client_error());
        assert!(error.to_string().contains("SSO_IDP_ENTITY_ID"));
    }

    #[test]
    fn internal_error_is_generic() {
        let error = Error::Internal;
        assert_eq!(error.to_string(), "internal error");
    }
}
