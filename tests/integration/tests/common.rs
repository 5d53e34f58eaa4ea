//! Common test utilities and fixtures.

use std::sync::Arc;

use sso_core::SsoConfig;
use sso_crypto::X509Credential;
use sso_protocol_saml::bindings::{marshall, HttpPostBinding, HttpRedirectBinding};
use sso_protocol_saml::inbound::{SsoPostForm, SsoRedirectParams};
use sso_protocol_saml::types::signature_algorithms;
use sso_protocol_saml::validator::{
    RequestValidatorConfig, SpInitValidator, StaticServiceProviders,
};
use sso_protocol_saml::AuthnRequest;

/// Entity ID of the test service provider.
pub const SP_ENTITY_ID: &str = "https://sp.example.com";

/// Registered ACS URL of the test service provider.
pub const ACS_URL: &str = "https://sp.example.com/acs";

/// Entity ID of a second SP that requires signed requests.
pub const SIGNING_SP_ENTITY_ID: &str = "https://signing-sp.example.com";

/// Registered ACS URL of the signing SP.
pub const SIGNING_ACS_URL: &str = "https://signing-sp.example.com/acs";

/// The IdP SSO endpoint accepted as `Destination`.
pub const DESTINATION: &str = "https://idp.example.com/saml/sso";

macro_rules! fixture {
    ($name:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/", $name))
    };
}

/// A key pair from the fixtures directory.
pub struct KeyPair {
    /// PEM certificate.
    pub certificate: &'static str,
    /// PEM PKCS#8 private key.
    pub private_key: &'static str,
}

impl KeyPair {
    /// Builds a credential holding both halves.
    pub fn credential(&self) -> anyhow::Result<X509Credential> {
        Ok(X509Credential::from_pem(
            Some(self.certificate),
            Some(self.private_key),
        )?)
    }

    /// Returns the DER certificate.
    pub fn certificate_der(&self) -> anyhow::Result<Vec<u8>> {
        let credential = X509Credential::from_pem(Some(self.certificate), None)?;
        credential
            .certificate_der()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| anyhow::anyhow!("fixture has no certificate"))
    }
}

/// RSA key registered for the signing SP.
pub const SP_RSA: KeyPair = KeyPair {
    certificate: fixture!("sp-rsa.crt.pem"),
    private_key: fixture!("sp-rsa.key.pem"),
};

/// RSA key nobody registered.
pub const OTHER_RSA: KeyPair = KeyPair {
    certificate: fixture!("other-rsa.crt.pem"),
    private_key: fixture!("other-rsa.key.pem"),
};

/// The IdP's own RSA key.
pub const IDP_RSA: KeyPair = KeyPair {
    certificate: fixture!("idp-rsa.crt.pem"),
    private_key: fixture!("idp-rsa.key.pem"),
};

/// P-256 key.
pub const SP_EC256: KeyPair = KeyPair {
    certificate: fixture!("sp-ec256.crt.pem"),
    private_key: fixture!("sp-ec256.key.pem"),
};

/// P-384 key.
pub const SP_EC384: KeyPair = KeyPair {
    certificate: fixture!("sp-ec384.crt.pem"),
    private_key: fixture!("sp-ec384.key.pem"),
};

/// P-521 key.
pub const SP_EC521: KeyPair = KeyPair {
    certificate: fixture!("sp-ec521.crt.pem"),
    private_key: fixture!("sp-ec521.key.pem"),
};

/// Validator and registry shared by a test.
pub struct TestEnv {
    /// IdP configuration.
    pub config: SsoConfig,
    /// Validator over the two registered SPs.
    pub validator: SpInitValidator,
}

impl TestEnv {
    /// Creates a validator with an unsigned SP and a signing SP registered.
    pub fn new() -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sso_protocol_saml=debug,sso_crypto=debug")
            .with_test_writer()
            .try_init();

        let config = SsoConfig::for_testing();
        sso_protocol_saml::init(&config)?;

        let providers = StaticServiceProviders::new()
            .with_provider(
                RequestValidatorConfig::new(SP_ENTITY_ID)
                    .with_name("Unsigned SP")
                    .with_acs_url(ACS_URL),
            )
            .with_provider(
                RequestValidatorConfig::new(SIGNING_SP_ENTITY_ID)
                    .with_name("Signing SP")
                    .with_acs_url(SIGNING_ACS_URL)
                    .require_signature(SP_RSA.certificate_der()?),
            );

        Ok(Self {
            validator: SpInitValidator::new(config.clone(), Arc::new(providers)),
            config,
        })
    }
}

/// A well-formed request from the unsigned SP.
pub fn unsigned_request(id: &str) -> AuthnRequest {
    AuthnRequest::new(SP_ENTITY_ID)
        .with_id(id)
        .with_acs_url(ACS_URL)
        .with_destination(DESTINATION)
}

/// A well-formed request from the signing SP, before signing.
pub fn signing_sp_request(id: &str) -> AuthnRequest {
    AuthnRequest::new(SIGNING_SP_ENTITY_ID)
        .with_id(id)
        .with_acs_url(SIGNING_ACS_URL)
        .with_destination(DESTINATION)
}

/// Encodes a request for the Redirect binding, returning the parsed
/// parameters and the raw query.
pub fn redirect(
    request: &AuthnRequest,
    relay_state: Option<&str>,
) -> anyhow::Result<(SsoRedirectParams, String)> {
    let url = HttpRedirectBinding::encode_request(&marshall(request), DESTINATION, relay_state)?;
    split_query(&url)
}

/// Encodes and signs a request for the Redirect binding with RSA-SHA256.
pub fn signed_redirect(
    request: &AuthnRequest,
    relay_state: Option<&str>,
    key: &KeyPair,
) -> anyhow::Result<(SsoRedirectParams, String)> {
    let url = HttpRedirectBinding::encode_signed_request(
        &marshall(request),
        DESTINATION,
        relay_state,
        signature_algorithms::RSA_SHA256,
        &key.credential()?,
    )?;
    split_query(&url)
}

/// Encodes an XML document for the POST binding.
pub fn post_form(xml: &str, relay_state: Option<&str>) -> SsoPostForm {
    SsoPostForm {
        saml_request: Some(HttpPostBinding::encode(xml)),
        relay_state: relay_state.map(str::to_string),
    }
}

fn split_query(url: &str) -> anyhow::Result<(SsoRedirectParams, String)> {
    let (_, query) = url
        .split_once('?')
        .ok_or_else(|| anyhow::anyhow!("no query in {url}"))?;
    Ok((SsoRedirectParams::from_query(query), query.to_string()))
}
