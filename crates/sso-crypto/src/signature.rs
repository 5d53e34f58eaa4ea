//! Raw digital signature operations.
//!
//! Signing takes a PKCS#8 (or, for RSA, PKCS#1) private key in DER form.
//! Verification always takes the signer's X.509 certificate so callers can
//! only verify against key material they registered themselves.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, EcdsaKeyPair, RsaKeyPair, UnparsedPublicKey},
};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::algorithm::SignatureScheme;

/// Error type for signature operations.
///
/// Key and credential problems are kept apart from a genuine signature
/// mismatch so callers can log misconfiguration separately.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification failed.
    #[error("signature verification failed")]
    Verification,

    /// Algorithm not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// The credential is missing a certificate or private key, or is unparsable.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl SignatureError {
    /// Returns true if this error indicates misconfiguration rather than a bad signature.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Verification)
    }
}

/// Signs data with the given scheme and DER private key.
///
/// # Errors
///
/// Returns [`SignatureError::UnsupportedAlgorithm`] for legacy schemes,
/// [`SignatureError::InvalidKey`] if the key does not match the scheme and
/// [`SignatureError::Signing`] if the underlying operation fails.
pub fn sign(
    scheme: SignatureScheme,
    private_key_der: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, SignatureError> {
    let rng = SystemRandom::new();

    let ecdsa_alg = match scheme {
        SignatureScheme::RsaPkcs1Sha1 => {
            return Err(SignatureError::UnsupportedAlgorithm(
                "RSA-SHA1 is accepted for verification only".to_string(),
            ));
        }
        SignatureScheme::RsaPkcs1Sha256
        | SignatureScheme::RsaPkcs1Sha384
        | SignatureScheme::RsaPkcs1Sha512 => return rsa_sign(scheme, private_key_der, data, &rng),
        SignatureScheme::EcdsaP256Sha256 => &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
        SignatureScheme::EcdsaP384Sha384 => &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
        SignatureScheme::EcdsaP521Sha512 => &signature::ECDSA_P521_SHA512_FIXED_SIGNING,
    };

    let key_pair = EcdsaKeyPair::from_pkcs8(ecdsa_alg, private_key_der)
        .map_err(|e| SignatureError::InvalidKey(format!("Invalid EC key: {e}")))?;

    let sig = key_pair
        .sign(&rng, data)
        .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}")))?;

    Ok(sig.as_ref().to_vec())
}

fn rsa_sign(
    scheme: SignatureScheme,
    key_der: &[u8],
    data: &[u8],
    rng: &SystemRandom,
) -> Result<Vec<u8>, SignatureError> {
    let key_pair = RsaKeyPair::from_pkcs8(key_der)
        .or_else(|_| RsaKeyPair::from_der(key_der))
        .map_err(|e| SignatureError::InvalidKey(format!("Invalid RSA key: {e}")))?;

    let padding: &'static dyn signature::RsaEncoding = match scheme {
        SignatureScheme::RsaPkcs1Sha256 => &signature::RSA_PKCS1_SHA256,
        SignatureScheme::RsaPkcs1Sha384 => &signature::RSA_PKCS1_SHA384,
        SignatureScheme::RsaPkcs1Sha512 => &signature::RSA_PKCS1_SHA512,
        other => {
            return Err(SignatureError::UnsupportedAlgorithm(other.name().to_string()));
        }
    };

    let mut sig = vec![0u8; key_pair.public_modulus_len()];
    key_pair
        .sign(padding, rng, data, &mut sig)
        .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Verifies a signature against the public key of a DER X.509 certificate.
///
/// Returns `Ok(false)` when the signature does not match, including when the
/// certificate's key type does not fit the scheme.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidCredential`] if the certificate cannot be parsed.
pub fn verify(
    scheme: SignatureScheme,
    certificate_der: &[u8],
    data: &[u8],
    sig: &[u8],
) -> Result<bool, SignatureError> {
    let public_key = public_key_from_certificate(certificate_der)?;

    let verification_alg: &'static dyn signature::VerificationAlgorithm = match scheme {
        SignatureScheme::RsaPkcs1Sha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        SignatureScheme::RsaPkcs1Sha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        SignatureScheme::RsaPkcs1Sha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        SignatureScheme::RsaPkcs1Sha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        SignatureScheme::EcdsaP256Sha256 => &signature::ECDSA_P256_SHA256_FIXED,
        SignatureScheme::EcdsaP384Sha384 => &signature::ECDSA_P384_SHA384_FIXED,
        SignatureScheme::EcdsaP521Sha512 => &signature::ECDSA_P521_SHA512_FIXED,
    };

    let unparsed = UnparsedPublicKey::new(verification_alg, public_key.as_slice());

    match unparsed.verify(data, sig) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Extracts the raw subject public key bytes from a DER certificate.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidCredential`] if the certificate cannot be parsed.
pub fn public_key_from_certificate(certificate_der: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let (_, cert) = X509Certificate::from_der(certificate_der).map_err(|e| {
        SignatureError::InvalidCredential(format!("Failed to parse certificate: {e}"))
    })?;

    Ok(cert.public_key().subject_public_key.data.to_vec())
}
