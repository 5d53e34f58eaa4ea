//! Gateway configuration.
//!
//! Configuration is loaded from environment variables (optionally seeded from a
//! `.env` file) with sensible defaults for everything except the identity
//! provider's own entity id.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default path used to display protocol errors to the user.
pub const DEFAULT_ERROR_PAGE_URL: &str = "/notifications";

/// Default upper bound on the inflated size of a Redirect-binding message.
pub const DEFAULT_MAX_INFLATED_BYTES: usize = 1024 * 1024;

/// Process-wide configuration of the SAML SSO gateway core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Entity id of this identity provider, used as issuer of error responses.
    pub idp_entity_id: String,

    /// Endpoint addresses of this system accepted as an AuthnRequest `Destination`.
    #[serde(default)]
    pub destination_urls: Vec<String>,

    /// Generic error display path used when no SP-specific page applies.
    #[serde(default = "default_error_page_url")]
    pub error_page_url: String,

    /// Maximum number of bytes a Redirect-binding message may inflate to.
    #[serde(default = "default_max_inflated_bytes")]
    pub max_inflated_bytes: usize,

    /// Accept RSA-SHA1 signatures and SHA-1 digests when verifying requests.
    #[serde(default)]
    pub allow_legacy_sha1: bool,

    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_error_page_url() -> String {
    DEFAULT_ERROR_PAGE_URL.to_string()
}

const fn default_max_inflated_bytes() -> usize {
    DEFAULT_MAX_INFLATED_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SsoConfig {
    /// Creates a configuration with defaults for the given IdP entity id.
    #[must_use]
    pub fn new(idp_entity_id: impl Into<String>) -> Self {
        Self {
            idp_entity_id: idp_entity_id.into(),
            destination_urls: Vec::new(),
            error_page_url: default_error_page_url(),
            max_inflated_bytes: DEFAULT_MAX_INFLATED_BYTES,
            allow_legacy_sha1: false,
            log_level: default_log_level(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `SSO_IDP_ENTITY_ID` is missing or a
    /// numeric/boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SsoConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let idp_entity_id = lookup("SSO_IDP_ENTITY_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("SSO_IDP_ENTITY_ID environment variable is required".to_string())
            })?;

        let destination_urls = lookup("SSO_DESTINATION_URLS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let error_page_url = lookup("SSO_ERROR_PAGE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_error_page_url);

        let max_inflated_bytes = match lookup("SSO_MAX_INFLATED_BYTES") {
            Some(v) => v.trim().parse().map_err(|e| {
                Error::Config(format!("SSO_MAX_INFLATED_BYTES must be a byte count: {e}"))
            })?,
            None => DEFAULT_MAX_INFLATED_BYTES,
        };

        let allow_legacy_sha1 = match lookup("SSO_ALLOW_LEGACY_SHA1") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("SSO_ALLOW_LEGACY_SHA1 must be true or false, got '{v}'"))
            })?,
            None => false,
        };

        let log_level = lookup("SSO_LOG_LEVEL").unwrap_or_else(default_log_level);

        Ok(Self {
            idp_entity_id,
            destination_urls,
            error_page_url,
            max_inflated_bytes,
            allow_legacy_sha1,
            log_level,
        })
    }

    /// Creates a configuration suitable for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            idp_entity_id: "https://idp.example.com".to_string(),
            destination_urls: vec!["https://idp.example.com/saml/sso".to_string()],
            error_page_url: default_error_page_url(),
            max_inflated_bytes: DEFAULT_MAX_INFLATED_BYTES,
            allow_legacy_sha1: false,
            log_level: "debug".to_string(),
        }
    }

    /// Sets the accepted destination URLs.
    #[must_use]
    pub fn with_destination_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the generic error page URL.
    #[must_use]
    pub fn with_error_page_url(mut self, url: impl Into<String>) -> Self {
        self.error_page_url = url.into();
        self
    }

    /// Sets the inflate bound for Redirect-binding messages.
    #[must_use]
    pub const fn with_max_inflated_bytes(mut self, max: usize) -> Self {
        self.max_inflated_bytes = max;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn lookup_applies_defaults() {
        let config =
            SsoConfig::from_lookup(lookup_from(&[("SSO_IDP_ENTITY_ID", "https://idp.test")]))
                .unwrap();

        assert_eq!(config.idp_entity_id, "https://idp.test");
        assert!(config.destination_urls.is_empty());
        assert_eq!(config.error_page_url, "/notifications");
        assert_eq!(config.max_inflated_bytes, DEFAULT_MAX_INFLATED_BYTES);
        assert!(!config.allow_legacy_sha1);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn lookup_reads_all_variables() {
        let config = SsoConfig::from_lookup(lookup_from(&[
            ("SSO_IDP_ENTITY_ID", "https://idp.test"),
            (
                "SSO_DESTINATION_URLS",
                "https://idp.test/sso, https://idp.test/sso/post ,",
            ),
            ("SSO_ERROR_PAGE_URL", "https://idp.test/error"),
            ("SSO_MAX_INFLATED_BYTES", "4096"),
            ("SSO_ALLOW_LEGACY_SHA1", "yes"),
            ("SSO_LOG_LEVEL", "trace"),
        ]))
        .unwrap();

        assert_eq!(
            config.destination_urls,
            vec!["https://idp.test/sso", "https://idp.test/sso/post"]
        );
        assert_eq!(config.error_page_url, "https://idp.test/error");
        assert_eq!(config.max_inflated_bytes, 4096);
        assert!(config.allow_legacy_sha1);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn missing_entity_id_is_rejected() {
        let result = SsoConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let result = SsoConfig::from_lookup(lookup_from(&[
            ("SSO_IDP_ENTITY_ID", "https://idp.test"),
            ("SSO_MAX_INFLATED_BYTES", "a lot"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = SsoConfig::from_lookup(lookup_from(&[
            ("SSO_IDP_ENTITY_ID", "https://idp.test"),
            ("SSO_ALLOW_LEGACY_SHA1", "maybe"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SsoConfig =
            serde_json::from_str(r#"{"idp_entity_id":"https://idp.test"}"#).unwrap();
        assert_eq!(config, SsoConfig::new("https://idp.test"));
    }

    #[test]
    fn testing_config_has_destination() {
        let config = SsoConfig::for_testing();
        assert_eq!(config.destination_urls.len(), 1);
        assert_eq!(config.error_page_url, DEFAULT_ERROR_PAGE_URL);
    }
}
