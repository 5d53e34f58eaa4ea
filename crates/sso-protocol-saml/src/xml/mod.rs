//! Secure XML reading and canonicalization.
//!
//! Inbound messages are parsed into an owned [`XmlElement`] tree with
//! namespace names resolved, so lookups never depend on the prefixes a
//! sender chose. [`c14n`] renders any subtree in exclusive canonical form for
//! digest and signature computation.

pub mod c14n;
mod document;

pub use document::*;

/// Escapes text for use as element content or a double-quoted attribute value.
#[must_use]
pub fn escape(value: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(value)
}
