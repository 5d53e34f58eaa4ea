//! SAML 2.0 inbound single sign-on.
//!
//! Receives SP-initiated `AuthnRequest` messages on the HTTP-Redirect and
//! HTTP-POST bindings, verifies their signatures and validates them against
//! the requesting service provider's configuration.
//!
//! - [`bindings`] - Redirect (DEFLATE + base64) and POST (base64) encoding
//! - [`signature`] - enveloped XML signatures and detached query signatures
//! - [`validator`] - the ordered request checks and their outcome
//! - [`inbound`] - binding parameters and decoded requests
//! - [`types`] - protocol messages
//! - [`xml`] - a hardened XML reader and exclusive canonicalization
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sso_core::SsoConfig;
//! use sso_protocol_saml::inbound::SsoRedirectParams;
//! use sso_protocol_saml::validator::{SpInitValidator, StaticServiceProviders, ValidationOutcome};
//!
//! let config = SsoConfig::from_env()?;
//! sso_protocol_saml::init(&config)?;
//!
//! let validator = SpInitValidator::new(config, Arc::new(StaticServiceProviders::new()));
//! match validator.handle_redirect(&SsoRedirectParams::from_query(query), Some(query)) {
//!     ValidationOutcome::Validated(request) => { /* authenticate */ }
//!     ValidationOutcome::Failed(failure) => { /* send failure.to_response(..) */ }
//! }
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod error;
pub mod inbound;
pub mod signature;
pub mod types;
pub mod validator;
pub mod xml;

pub use error::{SamlError, SamlResult};
pub use types::*;

use sso_core::SsoConfig;
use sso_crypto::provider::{self, AlreadyInitialised};
use sso_crypto::CryptoSettings;

/// Installs the process-wide crypto settings derived from the configuration.
///
/// Call once at startup, before any request is validated.
///
/// # Errors
///
/// Returns [`AlreadyInitialised`] if different settings were installed earlier.
pub fn init(config: &SsoConfig) -> Result<(), AlreadyInitialised> {
    provider::init(CryptoSettings {
        allow_legacy_sha1: config.allow_legacy_sha1,
    })
}
