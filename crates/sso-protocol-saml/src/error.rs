//! SAML error types.
//!
//! Provides error types for binding decode, XML parsing, signature handling
//! and service-provider resolution.

use sso_crypto::{CredentialError, SignatureError};
use thiserror::Error;

use crate::types::status_codes;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The message could not be decoded from its binding or parsed as XML.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Signature creation or verification could not be performed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The service provider configuration could not be resolved.
    #[error("configuration resolution error: {0}")]
    ConfigResolution(#[from] ConfigResolutionError),

    /// The system's own credential could not be obtained.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An outbound message could not be encoded for its binding.
    #[error("encode error: {0}")]
    Encode(String),
}

impl SamlError {
    /// Returns the SAML top-level status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Decode(_)
            | Self::ConfigResolution(_)
            | Self::MissingElement(_)
            | Self::InvalidRequest(_) => status_codes::REQUESTER,
            Self::Signature(e) if !e.is_configuration_error() => status_codes::REQUESTER,
            Self::Signature(_) | Self::Credential(_) | Self::Encode(_) => status_codes::RESPONDER,
        }
    }
}

/// Failure to turn binding parameters into a parsed document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A required binding parameter is absent.
    #[error("missing {0} parameter")]
    MissingParameter(&'static str),

    /// A binding parameter appears more than once.
    #[error("repeated {0} parameter")]
    DuplicateParameter(&'static str),

    /// The parsed parameters disagree with the raw query they came from.
    #[error("binding parameters do not match the raw query")]
    InconsistentParameters,

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(String),

    /// The DEFLATE stream is corrupt.
    #[error("inflate error: {0}")]
    Deflate(String),

    /// The DEFLATE stream ended before its final block.
    #[error("compressed message is truncated")]
    Truncated,

    /// The inflated message exceeds the configured bound.
    #[error("inflated message exceeds {limit} bytes")]
    TooLarge {
        /// The configured bound in bytes.
        limit: usize,
    },

    /// The decoded message is not valid UTF-8.
    #[error("message is not valid UTF-8: {0}")]
    Utf8(String),

    /// The XML is not well-formed or uses an unsupported construct.
    #[error("XML parsing error: {0}")]
    Xml(String),

    /// The XML contains a document type declaration.
    #[error("DOCTYPE declarations are not allowed")]
    DtdForbidden,
}

/// Failure to resolve a service provider's validator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigResolutionError {
    /// No service provider is registered under the issuer.
    #[error("unknown service provider: {0}")]
    NotFound(String),

    /// The registered configuration is unusable.
    #[error("malformed service provider configuration: {0}")]
    Malformed(String),

    /// The configuration store could not be reached.
    #[error("service provider configuration unavailable: {0}")]
    Unavailable(String),
}

impl ConfigResolutionError {
    /// Returns true if the error comes from the configuration infrastructure
    /// rather than from the request naming an unknown service provider.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Unavailable(_))
    }
}

impl From<quick_xml::Error> for DecodeError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for DecodeError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for DecodeError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Utf8(err.to_string())
    }
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Utf8(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let err = SamlError::Decode(DecodeError::Truncated);
        assert_eq!(err.status_code(), status_codes::REQUESTER);

        let err = SamlError::Signature(SignatureError::Verification);
        assert_eq!(err.status_code(), status_codes::REQUESTER);

        let err = SamlError::Signature(SignatureError::InvalidCredential("no key".into()));
        assert_eq!(err.status_code(), status_codes::RESPONDER);

        let err = SamlError::ConfigResolution(ConfigResolutionError::NotFound("sp".into()));
        assert_eq!(err.status_code(), status_codes::REQUESTER);

        let err = SamlError::ConfigResolution(ConfigResolutionError::Unavailable("db".into()));
        assert_eq!(err.status_code(), status_codes::REQUESTER);
    }

    #[test]
    fn infrastructure_errors() {
        assert!(!ConfigResolutionError::NotFound("sp".into()).is_infrastructure());
        assert!(ConfigResolutionError::Malformed("acs".into()).is_infrastructure());
        assert!(ConfigResolutionError::Unavailable("db".into()).is_infrastructure());
    }

    #[test]
    fn decode_error_messages() {
        let err = DecodeError::TooLarge { limit: 1024 };
        assert_eq!(err.to_string(), "inflated message exceeds 1024 bytes");
        assert!(DecodeError::DtdForbidden.to_string().contains("DOCTYPE"));
    }
}
