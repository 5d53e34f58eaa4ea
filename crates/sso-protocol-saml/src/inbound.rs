//! Inbound SSO messages.
//!
//! Binding parameters as they arrive at the SSO endpoint, and the decoded
//! request handed to validation.

use serde::{Deserialize, Serialize};

use crate::bindings::{
    HttpPostBinding, HttpRedirectBinding, RedirectQuery, SignedQuery, RELAY_STATE, SAML_REQUEST,
    SIGNATURE, SIG_ALG,
};
use crate::error::{DecodeError, SamlResult};
use crate::types::{AuthnRequest, SamlBinding};

/// Query parameters for SSO redirect binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoRedirectParams {
    /// The SAML request (deflated, base64, URL-encoded).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,

    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,

    /// Signature (if signed).
    #[serde(rename = "Signature")]
    pub signature: Option<String>,

    /// Signature algorithm.
    #[serde(rename = "SigAlg")]
    pub sig_alg: Option<String>,
}

impl SsoRedirectParams {
    /// Parses the parameters out of a raw query string.
    ///
    /// Unknown parameters are ignored and the last occurrence of a repeated
    /// parameter wins.
    #[must_use]
    pub fn from_query(raw_query: &str) -> Self {
        let raw_query = raw_query.strip_prefix('?').unwrap_or(raw_query);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                SAML_REQUEST => params.saml_request = value,
                RELAY_STATE => params.relay_state = value,
                SIGNATURE => params.signature = value,
                SIG_ALG => params.sig_alg = value,
                _ => {}
            }
        }
        params
    }

    /// Returns true if the query carries any detached-signature parameter.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some() || self.sig_alg.is_some()
    }
}

/// Form data for SSO POST binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoPostForm {
    /// The SAML request (base64-encoded).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,

    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

impl SsoPostForm {
    /// Parses an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn from_form_body(body: &str) -> Self {
        let mut form = Self::default();
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                SAML_REQUEST => form.saml_request = value,
                RELAY_STATE => form.relay_state = value,
                _ => {}
            }
        }
        form
    }
}

/// An AuthnRequest decoded from its binding, ready for validation.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    /// The decoded XML text.
    pub xml: String,
    /// The parsed request.
    pub request: AuthnRequest,
    /// The binding the request arrived on.
    pub binding: SamlBinding,
    /// Relay state, returned to the SP unchanged.
    pub relay_state: Option<String>,
    /// The detached signature of a Redirect-binding request, if any.
    pub query_signature: Option<SignedQuery>,
}

impl DecodedRequest {
    /// Parses a request from XML that was already decoded from its binding.
    ///
    /// # Errors
    ///
    /// Returns the parse error of [`AuthnRequest::from_xml`].
    pub fn from_xml(
        xml: impl Into<String>,
        binding: SamlBinding,
        relay_state: Option<String>,
    ) -> SamlResult<Self> {
        let xml = xml.into();
        let request = AuthnRequest::from_xml(&xml)?;
        Ok(Self {
            xml,
            request,
            binding,
            relay_state,
            query_signature: None,
        })
    }

    /// Decodes an HTTP-Redirect request.
    ///
    /// When `raw_query` is given every binding value, and the signed content,
    /// comes from one parse of it with the sender's URL encoding intact.
    /// `params` must then carry the same values. Without a raw query the
    /// signed content is rebuilt from `params`. A query with incomplete
    /// signature parameters is decoded without a signature.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingParameter`] without `SAMLRequest`,
    /// [`DecodeError::DuplicateParameter`] for a repeated binding parameter,
    /// [`DecodeError::InconsistentParameters`] if `params` disagree with the
    /// raw query, any decode error of the Redirect binding and any parse error.
    pub fn from_redirect(
        params: &SsoRedirectParams,
        raw_query: Option<&str>,
        max_inflated_bytes: usize,
    ) -> SamlResult<Self> {
        match raw_query {
            Some(raw) => Self::from_raw_redirect(params, raw, max_inflated_bytes),
            None => Self::from_decoded_redirect(params, max_inflated_bytes),
        }
    }

    fn from_raw_redirect(
        params: &SsoRedirectParams,
        raw_query: &str,
        max_inflated_bytes: usize,
    ) -> SamlResult<Self> {
        let query = RedirectQuery::parse(raw_query)?;
        let consistent = query.saml_request() == params.saml_request.as_deref()
            && query.relay_state() == params.relay_state.as_deref()
            && query.sig_alg() == params.sig_alg.as_deref()
            && query.signature() == params.signature.as_deref();
        if !consistent {
            return Err(DecodeError::InconsistentParameters.into());
        }

        let saml_request = query
            .saml_request()
            .ok_or(DecodeError::MissingParameter(SAML_REQUEST))?;
        let xml = HttpRedirectBinding::decode(saml_request, max_inflated_bytes)?;
        let relay_state = query.relay_state().map(str::to_owned);
        let mut decoded = Self::from_xml(xml, SamlBinding::HttpRedirect, relay_state)?;

        if query.is_signed() {
            decoded.query_signature = match query.signed_query() {
                Ok(signed) => Some(signed),
                Err(e) => {
                    tracing::debug!(error = %e, "Incomplete query signature");
                    None
                }
            };
        }

        Ok(decoded)
    }

    fn from_decoded_redirect(
        params: &SsoRedirectParams,
        max_inflated_bytes: usize,
    ) -> SamlResult<Self> {
        let saml_request = params
            .saml_request
            .as_deref()
            .ok_or(DecodeError::MissingParameter(SAML_REQUEST))?;
        let xml = HttpRedirectBinding::decode(saml_request, max_inflated_bytes)?;
        let relay_state = params.relay_state.clone();
        let mut decoded = Self::from_xml(xml, SamlBinding::HttpRedirect, relay_state)?;

        if let (Some(sig_alg), Some(signature)) =
            (params.sig_alg.as_deref(), params.signature.as_deref())
        {
            decoded.query_signature = Some(SignedQuery::from_decoded(
                saml_request,
                params.relay_state.as_deref(),
                sig_alg,
                signature,
            ));
        }

        Ok(decoded)
    }

    /// Decodes an HTTP-POST request.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingParameter`] without `SAMLRequest`, any
    /// decode error of the POST binding, and any parse error.
    pub fn from_post(form: &SsoPostForm) -> SamlResult<Self> {
        let saml_request = form
            .saml_request
            .as_deref()
            .ok_or(DecodeError::MissingParameter(SAML_REQUEST))?;

        let xml = HttpPostBinding::decode(saml_request)?;
        Self::from_xml(xml, SamlBinding::HttpPost, form.relay_state.clone())
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request.id
    }
}
