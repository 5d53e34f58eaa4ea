//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with raw DEFLATE compression.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use sso_crypto::X509Credential;

use crate::error::{DecodeError, SamlError, SamlResult};
use crate::signature::sign_query_string;

use super::{RELAY_STATE, SAML_REQUEST, SIGNATURE, SIG_ALG};

const MIN_INFLATE_CAPACITY: usize = 1024;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Compresses, base64-encodes and URL-encodes a message for use as a
    /// query parameter value.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encode`] if compression fails.
    pub fn encode(xml: &str) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = STANDARD.encode(compressed);
        Ok(urlencoding::encode(&encoded).into_owned())
    }

    /// Decodes an already URL-decoded `SAMLRequest` value back to XML.
    ///
    /// Whitespace inside the base64 text is ignored. Inflate output is
    /// bounded by `max_inflated_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Base64`] for malformed base64,
    /// [`DecodeError::Deflate`] for a corrupt stream, [`DecodeError::Truncated`]
    /// if the stream ends early, [`DecodeError::TooLarge`] if the bound is
    /// exceeded and [`DecodeError::Utf8`] for non-UTF-8 content.
    pub fn decode(value: &str, max_inflated_bytes: usize) -> Result<String, DecodeError> {
        let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let compressed = STANDARD.decode(compact)?;
        let inflated = inflate_bounded(&compressed, max_inflated_bytes)?;
        Ok(String::from_utf8(inflated)?)
    }

    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Returns the destination URL with `SAMLRequest` and, if given,
    /// `RelayState` appended.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encode`] if compression fails.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let query = Self::request_query(xml, relay_state)?;
        Ok(append_query(destination, &query))
    }

    /// Encodes and signs a SAML request for HTTP-Redirect binding.
    ///
    /// The signature is over the query string parameters, not embedded in the XML.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encode`] if compression fails and
    /// [`SamlError::Signature`] if signing fails.
    pub fn encode_signed_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        credential: &X509Credential,
    ) -> SamlResult<String> {
        let mut query = Self::request_query(xml, relay_state)?;
        sign_query_string(&mut query, sig_alg, credential)?;
        Ok(append_query(destination, &query))
    }

    fn request_query(xml: &str, relay_state: Option<&str>) -> SamlResult<String> {
        let mut query = format!("{SAML_REQUEST}={}", Self::encode(xml)?);
        if let Some(rs) = relay_state {
            query.push_str(&format!("&{RELAY_STATE}={}", urlencoding::encode(rs)));
        }
        Ok(query)
    }
}

/// The signed portion of a Redirect-binding query plus its signature.
///
/// The signed content is `SAMLRequest=..[&RelayState=..]&SigAlg=..` in that
/// order, with values in their URL-encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    signed_content: String,
    sig_alg: String,
    signature: String,
}

impl SignedQuery {
    /// Extracts the signed content from a raw query string, keeping each
    /// value's URL encoding exactly as it arrived.
    ///
    /// # Errors
    ///
    /// See [`RedirectQuery::parse`] and [`RedirectQuery::signed_query`].
    pub fn from_raw_query(raw_query: &str) -> Result<Self, DecodeError> {
        RedirectQuery::parse(raw_query)?.signed_query()
    }

    /// Rebuilds the signed content from already decoded parameter values by
    /// URL-encoding them again.
    ///
    /// Senders that encode differently (for example lowercase hex escapes)
    /// will not verify through this path; prefer [`SignedQuery::from_raw_query`].
    #[must_use]
    pub fn from_decoded(
        saml_request: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        signature: &str,
    ) -> Self {
        let mut signed_content = format!("{SAML_REQUEST}={}", urlencoding::encode(saml_request));
        if let Some(rs) = relay_state {
            signed_content.push_str(&format!("&{RELAY_STATE}={}", urlencoding::encode(rs)));
        }
        signed_content.push_str(&format!("&{SIG_ALG}={}", urlencoding::encode(sig_alg)));

        Self {
            signed_content,
            sig_alg: sig_alg.to_string(),
            signature: signature.to_string(),
        }
    }

    /// Returns the exact byte sequence covered by the signature.
    #[must_use]
    pub fn signed_content(&self) -> &str {
        &self.signed_content
    }

    /// Returns the decoded `SigAlg` URI.
    #[must_use]
    pub fn sig_alg(&self) -> &str {
        &self.sig_alg
    }

    /// Returns the decoded, still base64-encoded, `Signature` value.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// One binding parameter as sent and as decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryParam<'a> {
    pair: &'a str,
    value: String,
}

/// The binding parameters of a raw Redirect query, parsed once.
///
/// Keys are form-decoded before matching, so `SAMLReques%74` is the same
/// parameter as `SAMLRequest`. Each binding parameter may appear at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectQuery<'a> {
    saml_request: Option<QueryParam<'a>>,
    relay_state: Option<QueryParam<'a>>,
    sig_alg: Option<QueryParam<'a>>,
    signature: Option<QueryParam<'a>>,
}

impl<'a> RedirectQuery<'a> {
    /// Parses a raw query string, with or without its leading `?`.
    ///
    /// Unknown parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::DuplicateParameter`] if a binding parameter is
    /// repeated and [`DecodeError::Utf8`] if a key or value does not decode
    /// to UTF-8.
    pub fn parse(raw_query: &'a str) -> Result<Self, DecodeError> {
        let raw_query = raw_query.strip_prefix('?').unwrap_or(raw_query);
        let mut query = Self::default();

        for pair in raw_query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (slot, name) = match form_decode(key)?.as_str() {
                SAML_REQUEST => (&mut query.saml_request, SAML_REQUEST),
                RELAY_STATE => (&mut query.relay_state, RELAY_STATE),
                SIG_ALG => (&mut query.sig_alg, SIG_ALG),
                SIGNATURE => (&mut query.signature, SIGNATURE),
                _ => continue,
            };
            if slot.is_some() {
                return Err(DecodeError::DuplicateParameter(name));
            }
            *slot = Some(QueryParam {
                pair,
                value: form_decode(value)?,
            });
        }

        Ok(query)
    }

    /// Returns the decoded `SAMLRequest` value.
    #[must_use]
    pub fn saml_request(&self) -> Option<&str> {
        self.saml_request.as_ref().map(|p| p.value.as_str())
    }

    /// Returns the decoded `RelayState` value.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_ref().map(|p| p.value.as_str())
    }

    /// Returns the decoded `SigAlg` value.
    #[must_use]
    pub fn sig_alg(&self) -> Option<&str> {
        self.sig_alg.as_ref().map(|p| p.value.as_str())
    }

    /// Returns the decoded `Signature` value.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_ref().map(|p| p.value.as_str())
    }

    /// Returns true if the query carries any detached-signature parameter.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.sig_alg.is_some() || self.signature.is_some()
    }

    /// Builds the signed content from the parameters exactly as sent.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingParameter`] if `SAMLRequest`, `SigAlg`
    /// or `Signature` is absent.
    pub fn signed_query(&self) -> Result<SignedQuery, DecodeError> {
        let saml_request = self
            .saml_request
            .as_ref()
            .ok_or(DecodeError::MissingParameter(SAML_REQUEST))?;
        let sig_alg = self
            .sig_alg
            .as_ref()
            .ok_or(DecodeError::MissingParameter(SIG_ALG))?;
        let signature = self
            .signature
            .as_ref()
            .ok_or(DecodeError::MissingParameter(SIGNATURE))?;

        let mut signed_content = saml_request.pair.to_string();
        if let Some(rs) = &self.relay_state {
            signed_content.push('&');
            signed_content.push_str(rs.pair);
        }
        signed_content.push('&');
        signed_content.push_str(sig_alg.pair);

        Ok(SignedQuery {
            signed_content,
            sig_alg: sig_alg.value.clone(),
            signature: signature.value.clone(),
        })
    }
}

/// Decodes one `application/x-www-form-urlencoded` component.
fn form_decode(raw: &str) -> Result<String, DecodeError> {
    Ok(urlencoding::decode(&raw.replace('+', " "))?.into_owned())
}

fn append_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Encode(format!("Compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Encode(format!("Compression finish error: {e}")))
}

/// Inflates raw DEFLATE data into a growable buffer, failing once the output
/// exceeds `limit` bytes or the input runs out before the final block.
fn inflate_bounded(data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let hard_cap = limit.saturating_add(1);
    let mut inflater = Decompress::new(false);
    let initial = data
        .len()
        .saturating_mul(4)
        .max(MIN_INFLATE_CAPACITY)
        .min(hard_cap);
    let mut out = Vec::with_capacity(initial);

    loop {
        if out.len() == out.capacity() {
            let room = hard_cap.saturating_sub(out.len()).max(1);
            out.reserve_exact(out.capacity().max(MIN_INFLATE_CAPACITY).min(room));
        }

        let consumed = usize::try_from(inflater.total_in())
            .map_err(|_| DecodeError::Deflate("input offset overflow".to_string()))?;
        let before_in = inflater.total_in();
        let before_out = inflater.total_out();

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| DecodeError::Deflate(e.to_string()))?;

        if out.len() > limit {
            return Err(DecodeError::TooLarge { limit });
        }

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let progressed =
                    inflater.total_in() != before_in || inflater.total_out() != before_out;
                if !progressed {
                    return Err(DecodeError::Truncated);
                }
            }
        }
    }
}
