//! X.509 credentials.
//!
//! An [`X509Credential`] pairs an entity certificate with an optional private
//! key. Verifying parties only need the certificate; signing parties need both.

use std::fmt;

use thiserror::Error;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

use crate::signature::SignatureError;

/// Error type for credential loading and resolution.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential source could not supply a credential.
    #[error("credential unavailable: {0}")]
    Unavailable(String),

    /// The supplied key or certificate could not be decoded.
    #[error("malformed credential: {0}")]
    Malformed(String),
}

/// An entity certificate plus an optional private key, both in DER form.
#[derive(Clone)]
pub struct X509Credential {
    certificate_der: Option<Vec<u8>>,
    private_key_der: Option<Zeroizing<Vec<u8>>>,
}

impl X509Credential {
    /// Creates a credential from DER-encoded parts.
    #[must_use]
    pub fn from_der(certificate_der: Option<Vec<u8>>, private_key_der: Option<Vec<u8>>) -> Self {
        Self {
            certificate_der,
            private_key_der: private_key_der.map(Zeroizing::new),
        }
    }

    /// Creates a credential from PEM-encoded parts.
    ///
    /// The private key may be PKCS#8 (`PRIVATE KEY`) or, for RSA, PKCS#1
    /// (`RSA PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Malformed`] if a PEM block is missing, has an
    /// unexpected label, or the certificate does not parse.
    pub fn from_pem(
        certificate_pem: Option<&str>,
        private_key_pem: Option<&str>,
    ) -> Result<Self, CredentialError> {
        let certificate_der = certificate_pem
            .map(|pem| {
                let der = pem_block(pem, &["CERTIFICATE"])?;
                X509Certificate::from_der(&der).map_err(|e| {
                    CredentialError::Malformed(format!("Invalid certificate: {e}"))
                })?;
                Ok::<_, CredentialError>(der)
            })
            .transpose()?;

        let private_key_der = private_key_pem
            .map(|pem| pem_block(pem, &["PRIVATE KEY", "RSA PRIVATE KEY"]))
            .transpose()?;

        Ok(Self::from_der(certificate_der, private_key_der))
    }

    /// Returns the DER certificate, if present.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate_der.as_deref()
    }

    /// Returns the DER private key, if present.
    #[must_use]
    pub fn private_key_der(&self) -> Option<&[u8]> {
        self.private_key_der.as_ref().map(|k| k.as_slice())
    }

    /// Returns true if this credential holds a private key.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.private_key_der.is_some()
    }

    /// Returns the certificate and private key required to produce a signature.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidCredential`] if either part is missing.
    pub fn signing_material(&self) -> Result<(&[u8], &[u8]), SignatureError> {
        let cert = self.certificate_der().ok_or_else(|| {
            SignatureError::InvalidCredential("credential has no certificate".to_string())
        })?;
        let key = self.private_key_der().ok_or_else(|| {
            SignatureError::InvalidCredential("credential has no private key".to_string())
        })?;
        Ok((cert, key))
    }
}

impl fmt::Debug for X509Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X509Credential")
            .field(
                "certificate_der",
                &self.certificate_der.as_ref().map(|c| format!("<{} bytes>", c.len())),
            )
            .field(
                "private_key_der",
                &self.private_key_der.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Source of the system's own signing credential.
///
/// Implemented by key stores outside this workspace. The credential is used
/// to sign outgoing messages, never to verify inbound ones.
pub trait CredentialProvider: Send + Sync {
    /// Resolves the current signing credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] if no credential can be supplied.
    fn signing_credential(&self) -> Result<X509Credential, CredentialError>;
}

impl CredentialProvider for X509Credential {
    fn signing_credential(&self) -> Result<X509Credential, CredentialError> {
        Ok(self.clone())
    }
}

/// Decodes the first PEM block, requiring one of the given labels.
fn pem_block(pem: &str, labels: &[&str]) -> Result<Vec<u8>, CredentialError> {
    let (_, block) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| CredentialError::Malformed(format!("Invalid PEM: {e}")))?;

    if !labels.contains(&block.label.as_str()) {
        return Err(CredentialError::Malformed(format!(
            "Unexpected PEM label '{}', expected one of {labels:?}",
            block.label
        )));
    }

    Ok(block.contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../tests/fixtures/sp-rsa.key.pem"
    ));
    const RSA_CERT: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../tests/fixtures/sp-rsa.crt.pem"
    ));

    #[test]
    fn loads_certificate_and_key() {
        let cred = X509Credential::from_pem(Some(RSA_CERT), Some(RSA_KEY)).unwrap();
        assert!(cred.can_sign());
        assert!(cred.signing_material().is_ok());
    }

    #[test]
    fn certificate_only_cannot_sign() {
        let cred = X509Credential::from_pem(Some(RSA_CERT), None).unwrap();
        assert!(!cred.can_sign());
        assert!(matches!(
            cred.signing_material(),
            Err(SignatureError::InvalidCredential(_))
        ));
    }

    #[test]
    fn rejects_swapped_pem_blocks() {
        let result = X509Credential::from_pem(Some(RSA_KEY), None);
        assert!(matches!(result, Err(CredentialError::Malformed(_))));

        let result = X509Credential::from_pem(None, Some(RSA_CERT));
        assert!(matches!(result, Err(CredentialError::Malformed(_))));
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let cred = X509Credential::from_pem(Some(RSA_CERT), Some(RSA_KEY)).unwrap();
        let debug = format!("{cred:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("MII"));
    }

    #[test]
    fn credential_provides_itself() {
        let cred = X509Credential::from_pem(Some(RSA_CERT), Some(RSA_KEY)).unwrap();
        let resolved = cred.signing_credential().unwrap();
        assert_eq!(resolved.certificate_der(), cred.certificate_der());
    }
}
