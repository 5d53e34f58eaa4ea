//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! # Usage
//!
//! ```rust,ignore
//! use sso_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! // Value for a SAMLRequest form field
//! let form_value = HttpPostBinding::encode(&request_xml);
//!
//! // Complete Redirect-binding URL
//! let url = HttpRedirectBinding::encode_request(
//!     &request_xml,
//!     "https://idp.example.com/sso",
//!     Some("relay_state"),
//! )?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

use crate::error::DecodeError;
use crate::signature::SignableDocument;
use crate::xml::XmlElement;

/// Query or form parameter carrying the request.
pub const SAML_REQUEST: &str = "SAMLRequest";

/// Opaque requester state echoed back unchanged.
pub const RELAY_STATE: &str = "RelayState";

/// Redirect-binding signature algorithm parameter.
pub const SIG_ALG: &str = "SigAlg";

/// Redirect-binding signature parameter.
pub const SIGNATURE: &str = "Signature";

/// Serializes a protocol message to XML text.
#[must_use]
pub fn marshall<D: SignableDocument + ?Sized>(document: &D) -> String {
    document.to_xml()
}

/// Parses XML text into a namespace-resolved element tree.
///
/// Document type declarations are rejected and no entity beyond the XML
/// predefined ones is ever expanded.
///
/// # Errors
///
/// Returns [`DecodeError::DtdForbidden`] or [`DecodeError::Xml`].
pub fn unmarshall(xml: &str) -> Result<XmlElement, DecodeError> {
    XmlElement::parse(xml)
}
