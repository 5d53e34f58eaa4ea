//! SAML Response types.
//!
//! Status-only responses sent back to a service provider when one of its
//! authentication requests is rejected. They never carry assertions.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{Status, SAMLP_NS, SAML_NS, SAML_VERSION_20};
use crate::signature::{SignableDocument, XmlSignature};
use crate::xml::escape;

/// SAML Response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the identity provider that issued this response.
    pub issuer: String,

    /// The ID of the request this response is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// The enveloped signature, if signed.
    #[serde(skip)]
    pub signature: Option<XmlSignature>,
}

impl Response {
    /// Creates a new error response.
    #[must_use]
    pub fn error(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            id: format!("_{}", uuid::Uuid::new_v4()),
            version: SAML_VERSION_20.to_string(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            in_response_to: None,
            destination: None,
            status,
            signature: None,
        }
    }

    /// Sets the request ID this response is for. An empty ID is ignored.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.in_response_to = (!request_id.is_empty()).then_some(request_id);
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl SignableDocument for Response {
    fn id(&self) -> &str {
        &self.id
    }

    fn to_xml(&self) -> String {
        let mut out = format!(
            "<samlp:Response xmlns:samlp=\"{SAMLP_NS}\" xmlns:saml=\"{SAML_NS}\" ID=\"{}\" Version=\"{}\" IssueInstant=\"{}\"",
            escape(&self.id),
            escape(&self.version),
            self.issue_instant.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        if let Some(destination) = &self.destination {
            out.push_str(&format!(" Destination=\"{}\"", escape(destination)));
        }
        if let Some(in_response_to) = &self.in_response_to {
            out.push_str(&format!(" InResponseTo=\"{}\"", escape(in_response_to)));
        }
        out.push('>');

        out.push_str("<saml:Issuer>");
        out.push_str(&escape(&self.issuer));
        out.push_str("</saml:Issuer>");
        if let Some(signature) = &self.signature {
            out.push_str(&signature.to_xml());
        }
        self.status.write_xml(&mut out);

        out.push_str("</samlp:Response>");
        out
    }

    fn signature(&self) -> Option<&XmlSignature> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: Option<XmlSignature>) {
        self.signature = signature;
    }
}
