//! SP-initiated AuthnRequest validation.
//!
//! Checks run in a fixed order and the first violation ends validation:
//!
//! 1. the issuer is present and names a registered SP
//! 2. the requested ACS URL is registered for that SP
//! 3. the SAML version is 2.0
//! 4. the issuer format, if any, is the entity format
//! 5. the subject carries no confirmation and the attribute index fits
//! 6. signed SPs: destination, then signature; unsigned SPs: the ACS URL

use std::sync::Arc;

use sso_core::SsoConfig;

use crate::error::SamlError;
use crate::inbound::{DecodedRequest, SsoPostForm, SsoRedirectParams};
use crate::signature::{verify_document, verify_query_string};
use crate::types::{status_codes, NameId, NameIdFormat, SamlBinding, SAML_VERSION_20};

use super::config::{RequestValidatorConfig, ServiceProviderResolver};
use super::outcome::{
    FailureKind, ValidatedRequest, ValidationFailure, ValidationOutcome, ValidationStage,
};

/// Validates SP-initiated AuthnRequests.
///
/// Holds no per-request state and may be shared between threads.
#[derive(Clone)]
pub struct SpInitValidator {
    config: SsoConfig,
    resolver: Arc<dyn ServiceProviderResolver>,
}

impl std::fmt::Debug for SpInitValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpInitValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpInitValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(config: SsoConfig, resolver: Arc<dyn ServiceProviderResolver>) -> Self {
        Self { config, resolver }
    }

    /// Returns the IdP configuration.
    #[must_use]
    pub fn config(&self) -> &SsoConfig {
        &self.config
    }

    /// Decodes and validates a request received on the HTTP-Redirect binding.
    ///
    /// Pass the raw query string when available so that the detached
    /// signature is checked over the bytes the SP actually signed.
    pub fn handle_redirect(
        &self,
        params: &SsoRedirectParams,
        raw_query: Option<&str>,
    ) -> ValidationOutcome {
        match DecodedRequest::from_redirect(params, raw_query, self.config.max_inflated_bytes) {
            Ok(decoded) => self.validate(&decoded),
            Err(e) => self.decode_failure(&e, params.relay_state.as_deref()),
        }
    }

    /// Decodes and validates a request received on the HTTP-POST binding.
    pub fn handle_post(&self, form: &SsoPostForm) -> ValidationOutcome {
        match DecodedRequest::from_post(form) {
            Ok(decoded) => self.validate(&decoded),
            Err(e) => self.decode_failure(&e, form.relay_state.as_deref()),
        }
    }

    /// Validates a decoded request.
    pub fn validate(&self, decoded: &DecodedRequest) -> ValidationOutcome {
        let request = &decoded.request;
        let mut attempt = Attempt {
            request_id: &request.id,
            relay_state: decoded.relay_state.as_deref(),
            error_url: self.config.error_page_url.clone(),
            stage: ValidationStage::Received,
        };

        let Some(sp_id) = request.issuer.as_ref().and_then(issuer_id) else {
            return attempt.fail(
                status_codes::REQUESTER,
                FailureKind::Validation,
                "Cannot find issuer.".to_string(),
            );
        };

        let sp = match self.resolver.resolve_service_provider(sp_id) {
            Ok(sp) => sp,
            Err(e) => {
                if e.is_infrastructure() {
                    tracing::error!(issuer = sp_id, error = %e, "Service provider lookup failed");
                }
                return attempt.fail(
                    status_codes::REQUESTER,
                    FailureKind::ConfigResolution,
                    e.to_string(),
                );
            }
        };

        if let Some(page) = &sp.error_page_url {
            attempt.error_url.clone_from(page);
        }
        let Some(acs_url) = request
            .assertion_consumer_service_url
            .as_deref()
            .and_then(|url| sp.registered_acs_url(url))
        else {
            return attempt.fail(
                status_codes::REQUESTER,
                FailureKind::Validation,
                "Invalid Assertion Consumer Service URL in the AuthnRequest message.".to_string(),
            );
        };
        attempt.error_url = acs_url.to_string();
        attempt.passed(ValidationStage::IssuerResolved);

        if request.version != SAML_VERSION_20 {
            return attempt.fail(
                status_codes::VERSION_MISMATCH,
                FailureKind::Validation,
                "Invalid SAML Version in AuthnRequest. SAML Version should be equal to 2.0."
                    .to_string(),
            );
        }
        attempt.passed(ValidationStage::VersionChecked);

        if let Some(format) = request
            .issuer
            .as_ref()
            .and_then(|issuer| issuer.format.as_deref())
            .filter(|format| !format.trim().is_empty())
        {
            if format != NameIdFormat::Entity.uri() {
                return attempt.fail(
                    status_codes::REQUESTER,
                    FailureKind::Validation,
                    format!("Invalid Issuer Format attribute value {format}"),
                );
            }
        }

        let subject = request
            .subject
            .as_ref()
            .and_then(|subject| subject.name_id.clone())
            .filter(|name_id| !name_id.value.is_empty());

        if let Some(confirmation) = request
            .subject
            .as_ref()
            .and_then(|subject| subject.confirmations.first())
        {
            return attempt.fail(
                status_codes::REQUESTER,
                FailureKind::Validation,
                format!(
                    "Invalid Request message. A Subject confirmation method found {}",
                    confirmation.method
                ),
            );
        }

        let attribute_consuming_service_index = match request.attribute_consuming_service_index {
            Some(index) if index < 1 => None,
            Some(index) => match u16::try_from(index) {
                Ok(index) => Some(index),
                Err(_) => {
                    return attempt.fail(
                        status_codes::REQUESTER,
                        FailureKind::Validation,
                        format!(
                            "Invalid AttributeConsumingServiceIndex {index} in the AuthnRequest message."
                        ),
                    );
                }
            },
            None => None,
        };
        attempt.passed(ValidationStage::ScopeChecked);

        if sp.require_signature_validation {
            let destination = request.destination.as_deref();
            if let Some(outcome) = self.check_destination(&sp, destination, &attempt) {
                return outcome;
            }
            attempt.passed(ValidationStage::DestinationChecked);

            if let Some(outcome) = check_signature(decoded, &sp, &attempt) {
                return outcome;
            }
            attempt.passed(ValidationStage::SignatureVerified);
        } else if sp.registered_acs_url(acs_url).is_none() {
            return attempt.fail(
                status_codes::REQUESTER,
                FailureKind::Validation,
                format!(
                    "Invalid Assertion Consumer URL value '{acs_url}' in the AuthnRequest message from '{}'",
                    sp.display_name()
                ),
            );
        }
        attempt.passed(ValidationStage::AcsResolved);

        tracing::info!(
            request_id = attempt.request_id,
            service_provider = %sp.service_provider_id,
            binding = decoded.binding.uri(),
            "AuthnRequest validated"
        );

        ValidationOutcome::Validated(ValidatedRequest {
            service_provider_id: sp.service_provider_id.clone(),
            assertion_consumer_url: acs_url.to_string(),
            request_id: request.id.clone(),
            binding: decoded.binding,
            subject,
            attribute_consuming_service_index,
            force_authn: request.force_authn,
            is_passive: request.is_passive,
            relay_state: decoded.relay_state.clone(),
        })
    }

    fn check_destination(
        &self,
        sp: &RequestValidatorConfig,
        destination: Option<&str>,
        attempt: &Attempt<'_>,
    ) -> Option<ValidationOutcome> {
        let accepted = sp.accepted_destinations(&self.config.destination_urls);
        match destination {
            Some(destination) if accepted.iter().any(|url| url == destination) => None,
            _ => Some(attempt.fail(
                status_codes::REQUESTER,
                FailureKind::Validation,
                format!(
                    "Destination validation for AuthnRequest failed. Received: [{}]. Expected one in the list: [{}]",
                    destination.unwrap_or_default(),
                    accepted.join(",")
                ),
            )),
        }
    }

    fn decode_failure(&self, error: &SamlError, relay_state: Option<&str>) -> ValidationOutcome {
        let attempt = Attempt {
            request_id: "",
            relay_state,
            error_url: self.config.error_page_url.clone(),
            stage: ValidationStage::Received,
        };
        attempt.fail(
            error.status_code(),
            FailureKind::Decode,
            format!("Error decoding the AuthnRequest: {error}"),
        )
    }
}

fn issuer_id(issuer: &NameId) -> Option<&str> {
    if !issuer.value.trim().is_empty() {
        return Some(issuer.value.as_str());
    }
    issuer
        .sp_provided_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn check_signature(
    decoded: &DecodedRequest,
    sp: &RequestValidatorConfig,
    attempt: &Attempt<'_>,
) -> Option<ValidationOutcome> {
    const FAILED: &str = "Signature validation for AuthnRequest failed.";

    let Some(certificate) = sp.signing_certificate_der.as_deref() else {
        tracing::error!(
            service_provider = %sp.service_provider_id,
            "Signed requests required but no certificate is registered"
        );
        return Some(attempt.fail(
            status_codes::RESPONDER,
            FailureKind::Signature,
            FAILED.to_string(),
        ));
    };

    let verified = match decoded.binding {
        SamlBinding::HttpRedirect => match &decoded.query_signature {
            Some(query) => verify_query_string(
                query.signed_content(),
                query.sig_alg(),
                query.signature(),
                certificate,
            )
            .map_err(SamlError::from),
            None => Ok(false),
        },
        SamlBinding::HttpPost => verify_document(&decoded.xml, certificate),
    };

    match verified {
        Ok(true) => None,
        Ok(false) => Some(attempt.fail(
            status_codes::REQUESTER,
            FailureKind::Signature,
            FAILED.to_string(),
        )),
        Err(e) => {
            tracing::debug!(error = %e, "Signature verification error");
            Some(attempt.fail(e.status_code(), FailureKind::Signature, FAILED.to_string()))
        }
    }
}

/// Progress through one validation.
struct Attempt<'a> {
    request_id: &'a str,
    relay_state: Option<&'a str>,
    error_url: String,
    stage: ValidationStage,
}

impl Attempt<'_> {
    fn passed(&mut self, stage: ValidationStage) {
        tracing::debug!(request_id = self.request_id, ?stage, "AuthnRequest check passed");
        self.stage = stage;
    }

    fn fail(&self, status_code: &str, kind: FailureKind, message: String) -> ValidationOutcome {
        if status_code == status_codes::RESPONDER {
            tracing::error!(
                request_id = self.request_id,
                stage = ?self.stage,
                ?kind,
                %message,
                "AuthnRequest validation failed"
            );
        } else {
            tracing::warn!(
                request_id = self.request_id,
                stage = ?self.stage,
                ?kind,
                %message,
                "AuthnRequest validation failed"
            );
        }

        ValidationOutcome::Failed(ValidationFailure {
            status_code: status_code.to_string(),
            message,
            in_response_to: self.request_id.to_string(),
            acs_url_for_error: self.error_url.clone(),
            stage: self.stage,
            kind,
            relay_state: self.relay_state.map(str::to_string),
        })
    }
}
