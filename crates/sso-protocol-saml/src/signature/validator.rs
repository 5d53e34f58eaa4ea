//! XML Signature validation.
//!
//! Verifies enveloped document signatures and detached query-string
//! signatures against a certificate registered for the sender. Certificates
//! embedded in the message are never used.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sso_crypto::SignatureError;

use crate::error::SamlResult;
use crate::types::{canonicalization_algorithms, transforms, XMLDSIG_NS};
use crate::xml::{c14n, XmlElement};

use super::{DigestAlgorithm, SignatureAlgorithm};

/// XML signature validator.
///
/// Holds the single certificate a sender registered. A signature is accepted
/// only if it verifies under that certificate's public key.
pub struct XmlSignatureValidator<'a> {
    certificate_der: &'a [u8],
    allow_sha1: bool,
}

impl<'a> XmlSignatureValidator<'a> {
    /// Creates a validator for the given DER certificate.
    ///
    /// SHA-1 acceptance follows the process-wide crypto settings.
    #[must_use]
    pub fn new(certificate_der: &'a [u8]) -> Self {
        Self {
            certificate_der,
            allow_sha1: sso_crypto::provider::settings().allow_legacy_sha1,
        }
    }

    /// Overrides whether SHA-1 based signatures and digests are accepted.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Verifies the enveloped signature of a document.
    ///
    /// The signature must be a direct child of the root element and carry
    /// exactly one reference to the root's `ID`. A missing or structurally
    /// unacceptable signature yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the document is not well-formed XML and
    /// [`SignatureError::InvalidCredential`] if the certificate is unusable.
    pub fn validate_document(&self, xml: &str) -> SamlResult<bool> {
        let root = XmlElement::parse(xml)?;
        self.validate_element(&root)
    }

    /// Verifies the enveloped signature of an already parsed root element.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidCredential`] if the certificate is unusable.
    pub fn validate_element(&self, root: &XmlElement) -> SamlResult<bool> {
        let Some(signature) = root.child(XMLDSIG_NS, "Signature") else {
            tracing::debug!("Document carries no enveloped signature");
            return Ok(false);
        };
        let Some(signed_info) = signature.child(XMLDSIG_NS, "SignedInfo") else {
            return Ok(reject("missing SignedInfo"));
        };

        let c14n_method = signed_info
            .child(XMLDSIG_NS, "CanonicalizationMethod")
            .and_then(|e| e.attribute("Algorithm"));
        if c14n_method != Some(canonicalization_algorithms::EXCLUSIVE_C14N) {
            return Ok(reject("unsupported canonicalization method"));
        }

        let Some(algorithm) = signed_info
            .child(XMLDSIG_NS, "SignatureMethod")
            .and_then(|e| e.attribute("Algorithm"))
            .and_then(SignatureAlgorithm::from_uri)
        else {
            return Ok(reject("unsupported signature method"));
        };
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Ok(reject("SHA-1 signatures are not allowed"));
        }

        let references: Vec<_> = signed_info.children_named(XMLDSIG_NS, "Reference").collect();
        let [reference] = references.as_slice() else {
            return Ok(reject("exactly one Reference is required"));
        };

        let uri = reference.attribute("URI").unwrap_or_default();
        let root_id = root.attribute("ID").unwrap_or_default();
        let references_root =
            uri.is_empty() || (!root_id.is_empty() && uri == format!("#{root_id}"));
        if !references_root {
            return Ok(reject("Reference does not point at the document root"));
        }

        let transforms_ok = reference
            .child(XMLDSIG_NS, "Transforms")
            .map_or(true, |t| {
                t.children_named(XMLDSIG_NS, "Transform").all(|transform| {
                    matches!(
                        transform.attribute("Algorithm"),
                        Some(
                            transforms::ENVELOPED_SIGNATURE
                                | canonicalization_algorithms::EXCLUSIVE_C14N
                        )
                    )
                })
            });
        if !transforms_ok {
            return Ok(reject("unsupported reference transform"));
        }

        let Some(digest_algorithm) = reference
            .child(XMLDSIG_NS, "DigestMethod")
            .and_then(|e| e.attribute("Algorithm"))
            .and_then(DigestAlgorithm::from_uri)
        else {
            return Ok(reject("unsupported digest method"));
        };
        if digest_algorithm.is_deprecated() && !self.allow_sha1 {
            return Ok(reject("SHA-1 digests are not allowed"));
        }

        let Some(expected_digest) = reference
            .child(XMLDSIG_NS, "DigestValue")
            .and_then(|e| decode_base64_text(&e.text()))
        else {
            return Ok(reject("malformed DigestValue"));
        };

        let canonical = c14n::canonicalize_without_signature(root);
        let digest = sso_crypto::hash(digest_algorithm.hash(), canonical.as_bytes());
        if digest != expected_digest {
            return Ok(reject("digest mismatch"));
        }

        let Some(signature_value) = signature
            .child(XMLDSIG_NS, "SignatureValue")
            .and_then(|e| decode_base64_text(&e.text()))
        else {
            return Ok(reject("malformed SignatureValue"));
        };

        let canonical_signed_info = c14n::canonicalize(signed_info);
        let valid = sso_crypto::verify(
            algorithm.scheme(),
            self.certificate_der,
            canonical_signed_info.as_bytes(),
            &signature_value,
        )?;

        if !valid {
            tracing::debug!(algorithm = algorithm.uri(), "Document signature does not verify");
        }
        Ok(valid)
    }

    /// Verifies a detached HTTP-Redirect signature.
    ///
    /// `signed_content` is the exact query prefix that was signed, ending in
    /// the `SigAlg` parameter. An unknown or disallowed algorithm and a
    /// malformed signature encoding are reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidCredential`] if the certificate is unusable.
    pub fn validate_query(
        &self,
        signed_content: &str,
        signature_algorithm: &str,
        signature_b64: &str,
    ) -> Result<bool, SignatureError> {
        let Some(algorithm) = SignatureAlgorithm::from_uri(signature_algorithm) else {
            return Ok(reject("unsupported SigAlg"));
        };
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Ok(reject("SHA-1 signatures are not allowed"));
        }
        let Some(signature) = decode_base64_text(signature_b64) else {
            return Ok(reject("malformed Signature parameter"));
        };

        sso_crypto::verify(
            algorithm.scheme(),
            self.certificate_der,
            signed_content.as_bytes(),
            &signature,
        )
    }
}

/// Verifies the enveloped signature of a document against a registered certificate.
///
/// # Errors
///
/// See [`XmlSignatureValidator::validate_document`].
pub fn verify_document(xml: &str, certificate_der: &[u8]) -> SamlResult<bool> {
    XmlSignatureValidator::new(certificate_der).validate_document(xml)
}

/// Verifies a detached query-string signature against a registered certificate.
///
/// # Errors
///
/// See [`XmlSignatureValidator::validate_query`].
pub fn verify_query_string(
    signed_content: &str,
    signature_algorithm: &str,
    signature_b64: &str,
    certificate_der: &[u8],
) -> Result<bool, SignatureError> {
    XmlSignatureValidator::new(certificate_der).validate_query(
        signed_content,
        signature_algorithm,
        signature_b64,
    )
}

fn reject(reason: &str) -> bool {
    tracing::debug!(reason, "Rejecting signature");
    false
}

fn decode_base64_text(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).ok()
}
