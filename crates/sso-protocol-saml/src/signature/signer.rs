//! XML Signature creation.
//!
//! Provides enveloped signing of SAML documents and detached signing of
//! HTTP-Redirect query strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sso_crypto::{SignatureError, X509Credential};

use crate::error::SamlResult;
use crate::xml::{c14n, XmlElement};

use super::{DigestAlgorithm, SignableDocument, SignatureAlgorithm, SignatureConfig, XmlSignature};

/// XML document signer.
///
/// Signs SAML documents with the private key of an X.509 credential.
pub struct XmlSigner<'a> {
    credential: &'a X509Credential,
    config: SignatureConfig,
}

impl<'a> XmlSigner<'a> {
    /// Creates a signer using the default configuration (RSA-SHA256,
    /// certificate embedded).
    #[must_use]
    pub fn new(credential: &'a X509Credential) -> Self {
        Self {
            credential,
            config: SignatureConfig::default(),
        }
    }

    /// Sets the signature configuration.
    #[must_use]
    pub fn with_config(mut self, config: SignatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Signs a document in place.
    ///
    /// Any previous signature is discarded. The digest covers the canonical
    /// root element without its signature, and the new `ds:Signature` is
    /// attached so the next `to_xml` emits the signed form.
    ///
    /// # Errors
    ///
    /// Returns a signature error if the credential lacks a certificate or
    /// private key, if a SHA-1 algorithm is requested, or if signing fails.
    pub fn sign<D: SignableDocument + ?Sized>(&self, document: &mut D) -> SamlResult<()> {
        let (certificate, private_key) = self.credential.signing_material()?;

        if self.config.algorithm.is_deprecated() || self.config.digest_algorithm.is_deprecated() {
            return Err(SignatureError::UnsupportedAlgorithm(
                "SHA-1 is accepted for verification only".to_string(),
            )
            .into());
        }

        document.set_signature(None);
        let root = XmlElement::parse(&document.to_xml())?;
        let canonical = c14n::canonicalize_without_signature(&root);
        let digest = sso_crypto::hash(self.config.digest_algorithm.hash(), canonical.as_bytes());

        let mut signature = XmlSignature {
            algorithm: self.config.algorithm,
            digest_algorithm: self.config.digest_algorithm,
            reference_uri: format!("#{}", document.id()),
            digest_value: STANDARD.encode(digest),
            signature_value: String::new(),
            x509_certificate: None,
        };

        let signed_info = XmlElement::parse(&signature.signed_info_xml(true))?;
        let canonical_signed_info = c14n::canonicalize(&signed_info);
        let raw = sso_crypto::sign(
            self.config.algorithm.scheme(),
            private_key,
            canonical_signed_info.as_bytes(),
        )?;

        signature.signature_value = STANDARD.encode(raw);
        if self.config.include_certificate {
            signature.x509_certificate = Some(STANDARD.encode(certificate));
        }

        tracing::debug!(
            id = document.id(),
            algorithm = self.config.algorithm.uri(),
            "Signed document"
        );

        document.set_signature(Some(signature));
        Ok(())
    }
}

/// Signs a document with algorithms given as URIs.
///
/// # Errors
///
/// Returns [`SignatureError::UnsupportedAlgorithm`] for a blank or unknown
/// algorithm URI, [`SignatureError::InvalidCredential`] if the credential
/// lacks a certificate or private key, and any error from signing.
pub fn sign_document<D: SignableDocument + ?Sized>(
    document: &mut D,
    signature_algorithm: &str,
    digest_algorithm: &str,
    include_certificate: bool,
    credential: &X509Credential,
) -> SamlResult<()> {
    let algorithm = parse_signature_algorithm(signature_algorithm)?;
    let digest_algorithm = DigestAlgorithm::from_uri(digest_algorithm).ok_or_else(|| {
        SignatureError::UnsupportedAlgorithm(format!("digest algorithm {digest_algorithm}"))
    })?;

    let config = SignatureConfig {
        algorithm,
        digest_algorithm,
        include_certificate,
    };
    XmlSigner::new(credential).with_config(config).sign(document)
}

/// Signs an HTTP-Redirect query string in place.
///
/// Appends `SigAlg=<uri>` (adding a separating `&` when needed), signs the
/// exact bytes of the query as they now stand, and appends
/// `&Signature=<base64>`. Parameter values are URL-encoded. On error the
/// query is left untouched.
///
/// # Errors
///
/// Returns [`SignatureError::UnsupportedAlgorithm`] for a blank, unknown or
/// SHA-1 algorithm, [`SignatureError::InvalidCredential`] if the credential
/// lacks a certificate or private key, and any error from signing.
pub fn sign_query_string(
    query: &mut String,
    signature_algorithm: &str,
    credential: &X509Credential,
) -> Result<(), SignatureError> {
    let algorithm = parse_signature_algorithm(signature_algorithm)?;
    let (_, private_key) = credential.signing_material()?;

    let mut signed = query.clone();
    if !signed.is_empty() && !signed.ends_with('&') {
        signed.push('&');
    }
    signed.push_str("SigAlg=");
    signed.push_str(&urlencoding::encode(algorithm.uri()));

    let raw = sso_crypto::sign(algorithm.scheme(), private_key, signed.as_bytes())?;

    signed.push_str("&Signature=");
    signed.push_str(&urlencoding::encode(&STANDARD.encode(raw)));

    *query = signed;
    Ok(())
}

fn parse_signature_algorithm(uri: &str) -> Result<SignatureAlgorithm, SignatureError> {
    if uri.trim().is_empty() {
        return Err(SignatureError::UnsupportedAlgorithm(
            "signature algorithm is required".to_string(),
        ));
    }
    SignatureAlgorithm::from_uri(uri)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(uri.to_string()))
}
