//! XML Signature support for SAML.
//!
//! This module provides XML Digital Signature (XML-DSig) support for
//! signing and validating SAML messages, both as an enveloped `ds:Signature`
//! inside the document (POST binding) and as detached `SigAlg`/`Signature`
//! query parameters (Redirect binding).
//!
//! # Signing Algorithms
//!
//! The following signature algorithms are supported:
//! - RSA-SHA256 (recommended)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256 (P-256)
//! - ECDSA-SHA384 (P-384)
//! - ECDSA-SHA512 (P-521)
//!
//! RSA-SHA1 is accepted for verification only, and only when the process-wide
//! crypto settings allow legacy SHA-1.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use sso_crypto::{HashAlgorithm, SignatureScheme};

use crate::types::{
    canonicalization_algorithms, digest_algorithms, signature_algorithms, transforms, XMLDSIG_NS,
};
use crate::xml::escape;

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
    /// Legacy RSA with SHA-1 (verification only).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_algorithms::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_algorithms::ECDSA_SHA512,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Returns the digest algorithm matching this signature's hash.
    #[must_use]
    pub const fn digest(&self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 | Self::EcdsaSha512 => DigestAlgorithm::Sha512,
            Self::RsaSha1 => DigestAlgorithm::Sha1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_algorithms::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns the raw signature scheme used by the crypto layer.
    #[must_use]
    pub const fn scheme(&self) -> SignatureScheme {
        match self {
            Self::RsaSha256 => SignatureScheme::RsaPkcs1Sha256,
            Self::RsaSha384 => SignatureScheme::RsaPkcs1Sha384,
            Self::RsaSha512 => SignatureScheme::RsaPkcs1Sha512,
            Self::EcdsaSha256 => SignatureScheme::EcdsaP256Sha256,
            Self::EcdsaSha384 => SignatureScheme::EcdsaP384Sha384,
            Self::EcdsaSha512 => SignatureScheme::EcdsaP521Sha512,
            Self::RsaSha1 => SignatureScheme::RsaPkcs1Sha1,
        }
    }

    /// Returns true if this algorithm uses RSA.
    #[must_use]
    pub const fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 | Self::RsaSha1
        )
    }

    /// Returns true if this algorithm uses ECDSA.
    #[must_use]
    pub const fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            Self::EcdsaSha256 | Self::EcdsaSha384 | Self::EcdsaSha512
        )
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Digest algorithm selection for `ds:Reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-256 (recommended).
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// Legacy SHA-1 (verification only).
    Sha1,
}

impl DigestAlgorithm {
    /// Returns the URI for this digest algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Sha256 => digest_algorithms::SHA256,
            Self::Sha384 => digest_algorithms::SHA384,
            Self::Sha512 => digest_algorithms::SHA512,
            Self::Sha1 => digest_algorithms::SHA1,
        }
    }

    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            digest_algorithms::SHA256 => Some(Self::Sha256),
            digest_algorithms::SHA384 => Some(Self::Sha384),
            digest_algorithms::SHA512 => Some(Self::Sha512),
            digest_algorithms::SHA1 => Some(Self::Sha1),
            _ => None,
        }
    }

    /// Returns the hash algorithm used by the crypto layer.
    #[must_use]
    pub const fn hash(&self) -> HashAlgorithm {
        match self {
            Self::Sha256 => HashAlgorithm::Sha256,
            Self::Sha384 => HashAlgorithm::Sha384,
            Self::Sha512 => HashAlgorithm::Sha512,
            Self::Sha1 => HashAlgorithm::Sha1,
        }
    }

    /// Returns true if this algorithm is SHA-1.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Sha1)
    }
}

/// XML Signature structure.
///
/// Represents the `<ds:Signature>` element of a signed document. The
/// canonicalization and reference transforms are always exclusive C14N
/// without comments plus the enveloped-signature transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSignature {
    /// The signature algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// The digest algorithm used for the reference.
    pub digest_algorithm: DigestAlgorithm,
    /// The reference URI (`#` followed by the signed element's ID).
    pub reference_uri: String,
    /// The digest value (base64 encoded).
    pub digest_value: String,
    /// The signature value (base64 encoded).
    pub signature_value: String,
    /// Optional X.509 certificate (base64 encoded, DER format).
    pub x509_certificate: Option<String>,
}

impl XmlSignature {
    /// Renders the `ds:SignedInfo` element.
    ///
    /// With `declare_namespace` the element carries its own `xmlns:ds`, which
    /// makes it a standalone document with the same canonical form it has
    /// inside the `ds:Signature` element.
    #[must_use]
    pub fn signed_info_xml(&self, declare_namespace: bool) -> String {
        let ns = if declare_namespace {
            format!(" xmlns:ds=\"{XMLDSIG_NS}\"")
        } else {
            String::new()
        };
        let c14n = canonicalization_algorithms::EXCLUSIVE_C14N;

        format!(
            "<ds:SignedInfo{ns}>\
<ds:CanonicalizationMethod Algorithm=\"{c14n}\"/>\
<ds:SignatureMethod Algorithm=\"{sig}\"/>\
<ds:Reference URI=\"{uri}\">\
<ds:Transforms>\
<ds:Transform Algorithm=\"{env}\"/>\
<ds:Transform Algorithm=\"{c14n}\"/>\
</ds:Transforms>\
<ds:DigestMethod Algorithm=\"{digest}\"/>\
<ds:DigestValue>{digest_value}</ds:DigestValue>\
</ds:Reference>\
</ds:SignedInfo>",
            sig = self.algorithm.uri(),
            uri = escape(&self.reference_uri),
            env = transforms::ENVELOPED_SIGNATURE,
            digest = self.digest_algorithm.uri(),
            digest_value = self.digest_value,
        )
    }

    /// Renders the complete `ds:Signature` element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = format!("<ds:Signature xmlns:ds=\"{XMLDSIG_NS}\">");
        out.push_str(&self.signed_info_xml(false));
        out.push_str("<ds:SignatureValue>");
        out.push_str(&self.signature_value);
        out.push_str("</ds:SignatureValue>");
        if let Some(cert) = &self.x509_certificate {
            out.push_str("<ds:KeyInfo><ds:X509Data><ds:X509Certificate>");
            out.push_str(cert);
            out.push_str("</ds:X509Certificate></ds:X509Data></ds:KeyInfo>");
        }
        out.push_str("</ds:Signature>");
        out
    }
}

/// Configuration for signature creation.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// The signature algorithm to use.
    pub algorithm: SignatureAlgorithm,
    /// The digest algorithm to use for the reference.
    pub digest_algorithm: DigestAlgorithm,
    /// Whether to include the X.509 certificate in the signature.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self::with_algorithm(SignatureAlgorithm::RsaSha256)
    }
}

impl SignatureConfig {
    /// Creates a configuration for the given algorithm and its matching digest.
    #[must_use]
    pub const fn with_algorithm(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            digest_algorithm: algorithm.digest(),
            include_certificate: true,
        }
    }

    /// Sets whether the signer's certificate is embedded.
    #[must_use]
    pub const fn include_certificate(mut self, include: bool) -> Self {
        self.include_certificate = include;
        self
    }
}

/// A protocol message that can carry an enveloped signature.
pub trait SignableDocument {
    /// Returns the value of the root element's `ID` attribute.
    fn id(&self) -> &str;

    /// Serializes the document, including any attached signature.
    fn to_xml(&self) -> String;

    /// Returns the attached signature, if any.
    fn signature(&self) -> Option<&XmlSignature>;

    /// Attaches or removes the signature.
    fn set_signature(&mut self, signature: Option<XmlSignature>);
}
