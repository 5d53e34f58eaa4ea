//! Validation outcomes.

use serde::{Deserialize, Serialize};
use sso_crypto::CredentialProvider;

use crate::error::SamlResult;
use crate::signature::{SignatureConfig, XmlSigner};
use crate::types::{NameId, Response, SamlBinding, Status};

/// Checkpoints of request validation, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValidationStage {
    /// The request was decoded and parsed.
    Received,
    /// The issuer was found, its SP resolved and the requested ACS URL accepted.
    IssuerResolved,
    /// The SAML version is 2.0.
    VersionChecked,
    /// Issuer format, subject and attribute consuming index were accepted.
    ScopeChecked,
    /// The destination is one of the accepted endpoints.
    DestinationChecked,
    /// The request signature verified against the SP certificate.
    SignatureVerified,
    /// The ACS URL is registered for the SP.
    AcsResolved,
    /// All checks passed.
    Validated,
}

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The request could not be decoded or parsed.
    Decode,
    /// A protocol rule was violated.
    Validation,
    /// Signature verification failed or could not be attempted.
    Signature,
    /// The SP configuration could not be resolved.
    ConfigResolution,
}

/// Result of validating an AuthnRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The request may proceed to authentication.
    Validated(ValidatedRequest),
    /// The request was rejected.
    Failed(ValidationFailure),
}

impl ValidationOutcome {
    /// Returns true for a validated request.
    #[must_use]
    pub const fn is_validated(&self) -> bool {
        matches!(self, Self::Validated(_))
    }

    /// Returns the validated request, if any.
    #[must_use]
    pub const fn validated(&self) -> Option<&ValidatedRequest> {
        match self {
            Self::Validated(request) => Some(request),
            Self::Failed(_) => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Validated(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Returns the relay state to echo back to the SP.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        match self {
            Self::Validated(request) => request.relay_state.as_deref(),
            Self::Failed(failure) => failure.relay_state.as_deref(),
        }
    }
}

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// The resolved SP issuer.
    pub service_provider_id: String,
    /// The registered ACS URL the response goes to.
    pub assertion_consumer_url: String,
    /// The request ID, echoed as `InResponseTo`.
    pub request_id: String,
    /// The binding the request arrived on.
    pub binding: SamlBinding,
    /// The subject the SP asked to authenticate.
    pub subject: Option<NameId>,
    /// The requested attribute set, if in range.
    pub attribute_consuming_service_index: Option<u16>,
    /// Whether re-authentication was requested.
    pub force_authn: bool,
    /// Whether user interaction is forbidden.
    pub is_passive: bool,
    /// Relay state, returned to the SP unchanged.
    pub relay_state: Option<String>,
}

impl ValidatedRequest {
    /// Returns the requested subject's name, if given.
    #[must_use]
    pub fn subject_hint(&self) -> Option<&str> {
        self.subject
            .as_ref()
            .map(|name_id| name_id.value.as_str())
            .filter(|value| !value.is_empty())
    }
}

/// A rejected request and where to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Top-level SAML status code.
    pub status_code: String,
    /// Human readable reason, sent as `StatusMessage`.
    pub message: String,
    /// The request ID, empty if unknown.
    pub in_response_to: String,
    /// Where the error response or page is delivered.
    pub acs_url_for_error: String,
    /// The last checkpoint passed before the failure.
    pub stage: ValidationStage,
    /// Failure category.
    pub kind: FailureKind,
    /// Relay state, returned to the SP unchanged.
    pub relay_state: Option<String>,
}

impl ValidationFailure {
    /// Builds the error `Response` for this failure. It carries no assertion.
    #[must_use]
    pub fn to_response(&self, idp_entity_id: &str) -> Response {
        Response::error(
            idp_entity_id,
            Status::error(self.status_code.clone(), self.message.clone()),
        )
        .in_response_to(self.in_response_to.clone())
        .with_destination(self.acs_url_for_error.clone())
    }

    /// Builds the error `Response` signed with the system credential.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the provider has no credential, or any
    /// signing error.
    pub fn to_signed_response(
        &self,
        idp_entity_id: &str,
        credentials: &dyn CredentialProvider,
        config: SignatureConfig,
    ) -> SamlResult<Response> {
        let credential = credentials.signing_credential()?;
        let mut response = self.to_response(idp_entity_id);
        XmlSigner::new(&credential)
            .with_config(config)
            .sign(&mut response)?;
        Ok(response)
    }
}
