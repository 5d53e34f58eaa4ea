//! HTTP-POST Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-POST binding, where the message travels
//! base64-encoded in a form field. Signatures, if any, are enveloped in the
//! XML itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::DecodeError;

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Base64-encodes a message, without line breaks.
    #[must_use]
    pub fn encode(xml: &str) -> String {
        STANDARD.encode(xml)
    }

    /// Decodes a `SAMLRequest` form value back to XML.
    ///
    /// Line breaks and other whitespace inside the base64 text are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Base64`] for malformed base64 and
    /// [`DecodeError::Utf8`] for non-UTF-8 content.
    pub fn decode(value: &str) -> Result<String, DecodeError> {
        let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = STANDARD.decode(compact)?;
        Ok(String::from_utf8(decoded)?)
    }
}
