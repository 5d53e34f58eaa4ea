//! Per-SP validator configuration and its resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResolutionError;

/// Validation settings registered for one service provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestValidatorConfig {
    /// The SP's issuer (entity ID).
    pub service_provider_id: String,

    /// Display name used in error messages.
    #[serde(default)]
    pub name: String,

    /// Registered Assertion Consumer Service URLs.
    #[serde(default)]
    pub assertion_consumer_urls: Vec<String>,

    /// Informational: the ACS URL the gateway may use for unsolicited
    /// responses. Request validation never falls back to it; a request
    /// without an ACS URL is rejected.
    #[serde(default)]
    pub default_assertion_consumer_url: Option<String>,

    /// Require and verify a signature on every request.
    #[serde(default)]
    pub require_signature_validation: bool,

    /// DER certificate that verifies the SP's signatures.
    #[serde(default)]
    pub signing_certificate_der: Option<Vec<u8>>,

    /// Accepted `Destination` values, overriding the IdP-wide list when non-empty.
    #[serde(default)]
    pub destination_urls: Vec<String>,

    /// Error page used for this SP instead of the IdP default.
    #[serde(default)]
    pub error_page_url: Option<String>,
}

impl RequestValidatorConfig {
    /// Creates a configuration for an SP with no registered endpoints.
    #[must_use]
    pub fn new(service_provider_id: impl Into<String>) -> Self {
        Self {
            service_provider_id: service_provider_id.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers an ACS URL.
    ///
    /// The first registered URL is also recorded as
    /// `default_assertion_consumer_url`.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if self.default_assertion_consumer_url.is_none() {
            self.default_assertion_consumer_url = Some(url.clone());
        }
        self.assertion_consumer_urls.push(url);
        self
    }

    /// Requires signed requests verified with the given DER certificate.
    #[must_use]
    pub fn require_signature(mut self, certificate_der: impl Into<Vec<u8>>) -> Self {
        self.require_signature_validation = true;
        self.signing_certificate_der = Some(certificate_der.into());
        self
    }

    /// Sets the SP-specific accepted destinations.
    #[must_use]
    pub fn with_destination_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the SP-specific error page.
    #[must_use]
    pub fn with_error_page_url(mut self, url: impl Into<String>) -> Self {
        self.error_page_url = Some(url.into());
        self
    }

    /// Returns the registered ACS entry equal to `url`.
    #[must_use]
    pub fn registered_acs_url(&self, url: &str) -> Option<&str> {
        self.assertion_consumer_urls
            .iter()
            .map(String::as_str)
            .find(|registered| *registered == url)
    }

    /// Returns the destinations to accept: this SP's list if non-empty,
    /// otherwise the IdP-wide list.
    #[must_use]
    pub fn accepted_destinations<'a>(&'a self, idp_destinations: &'a [String]) -> &'a [String] {
        if self.destination_urls.is_empty() {
            idp_destinations
        } else {
            &self.destination_urls
        }
    }

    /// Returns the name used in error messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.service_provider_id
        } else {
            &self.name
        }
    }
}

/// Looks up validator configuration by SP issuer.
///
/// Implementations must be safe to share between concurrent validations.
pub trait ServiceProviderResolver: Send + Sync {
    /// Resolves the configuration registered for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigResolutionError::NotFound`] for an unknown issuer and
    /// `Malformed` or `Unavailable` for store failures.
    fn resolve_service_provider(
        &self,
        issuer: &str,
    ) -> Result<RequestValidatorConfig, ConfigResolutionError>;
}

/// An in-memory SP registry.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceProviders {
    providers: HashMap<String, RequestValidatorConfig>,
}

impl StaticServiceProviders {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an SP, replacing any previous entry with the same ID.
    #[must_use]
    pub fn with_provider(mut self, config: RequestValidatorConfig) -> Self {
        self.insert(config);
        self
    }

    /// Adds an SP, returning the entry it replaced.
    pub fn insert(&mut self, config: RequestValidatorConfig) -> Option<RequestValidatorConfig> {
        self.providers.insert(config.service_provider_id.clone(), config)
    }

    /// Returns the number of registered SPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no SP is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ServiceProviderResolver for StaticServiceProviders {
    fn resolve_service_provider(
        &self,
        issuer: &str,
    ) -> Result<RequestValidatorConfig, ConfigResolutionError> {
        self.providers
            .get(issuer)
            .cloned()
            .ok_or_else(|| ConfigResolutionError::NotFound(issuer.to_string()))
    }
}
