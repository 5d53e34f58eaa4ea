//! # sso-crypto
//!
//! Cryptographic operations for SAML message signing using aws-lc-rs.
//!
//! Provides digests, raw RSA PKCS#1 v1.5 and ECDSA signatures, X.509
//! credential handling and the process-wide crypto settings.
//!
//! ## Legacy algorithms
//!
//! SHA-1 based signatures exist in deployed SAML service providers. They are
//! available for verification only and must be enabled explicitly through
//! [`provider::init`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod credential;
pub mod hash;
pub mod provider;
pub mod signature;

pub use algorithm::{HashAlgorithm, SignatureScheme};
pub use credential::{CredentialError, CredentialProvider, X509Credential};
pub use hash::{hash, sha256, sha384, sha512};
pub use provider::CryptoSettings;
pub use signature::{sign, verify, SignatureError};
