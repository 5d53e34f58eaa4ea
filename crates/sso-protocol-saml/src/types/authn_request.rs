//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity
//! provider, with parsing from untrusted XML and serialization back to XML.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{NameId, NameIdPolicy, SamlBinding, SAMLP_NS, SAML_NS, SAML_VERSION_20, XMLDSIG_NS};
use crate::error::{SamlError, SamlResult};
use crate::signature::{DigestAlgorithm, SignableDocument, SignatureAlgorithm, XmlSignature};
use crate::xml::{escape, XmlElement};

/// SAML Authentication Request.
///
/// An authentication request message sent from a service provider to an
/// identity provider requesting authentication of a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request; empty if the sender omitted it.
    pub id: String,

    /// Version of the SAML protocol as sent; empty if omitted.
    pub version: String,

    /// Timestamp when this request was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_instant: Option<DateTime<Utc>>,

    /// The entity that issued the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<NameId>,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Index into the SP's assertion consumer service list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_index: Option<u16>,

    /// The address this request was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// The subject the requester wants authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Name ID policy constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Requested authentication context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_authn_context: Option<RequestedAuthnContext>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the user.
    #[serde(default)]
    pub is_passive: bool,

    /// Index into the SP's attribute consuming service list, as sent.
    ///
    /// Kept wider than the schema's unsigned short so out-of-range values
    /// reach validation instead of failing the parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_consuming_service_index: Option<i64>,

    /// A human-readable name for the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// Consent obtained for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,

    /// The enveloped signature, if the request is signed.
    #[serde(skip)]
    pub signature: Option<XmlSignature>,
}

impl AuthnRequest {
    /// Creates a new authentication request.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_{}", uuid::Uuid::new_v4()),
            version: SAML_VERSION_20.to_string(),
            issue_instant: Some(Utc::now()),
            issuer: Some(NameId::entity(issuer)),
            assertion_consumer_service_url: None,
            assertion_consumer_service_index: None,
            destination: None,
            protocol_binding: None,
            subject: None,
            name_id_policy: None,
            requested_authn_context: None,
            force_authn: false,
            is_passive: false,
            attribute_consuming_service_index: None,
            provider_name: None,
            consent: None,
            signature: None,
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the SAML version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replaces the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<NameId>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets the requested authentication context.
    #[must_use]
    pub fn with_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    /// Sets the attribute consuming service index.
    #[must_use]
    pub const fn with_attribute_consuming_service_index(mut self, index: i64) -> Self {
        self.attribute_consuming_service_index = Some(index);
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Sets passive authentication.
    #[must_use]
    pub const fn is_passive(mut self, passive: bool) -> Self {
        self.is_passive = passive;
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Returns the parsed protocol binding.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }

    /// Parses an AuthnRequest document.
    ///
    /// Elements are matched by namespace URI, so any prefix choice is
    /// accepted. Protocol-level checks (version, issuer format, and so on)
    /// are left to request validation.
    ///
    /// # Errors
    ///
    /// Returns a decode error for malformed or DOCTYPE-bearing XML and
    /// [`SamlError::InvalidRequest`] if the root is not an AuthnRequest or an
    /// attribute has the wrong lexical type.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        let root = XmlElement::parse(xml)?;
        Self::from_element(&root)
    }

    /// Reads an AuthnRequest from a parsed root element.
    ///
    /// # Errors
    ///
    /// See [`AuthnRequest::from_xml`].
    pub fn from_element(root: &XmlElement) -> SamlResult<Self> {
        if !root.is(SAMLP_NS, "AuthnRequest") {
            return Err(SamlError::InvalidRequest(format!(
                "expected samlp:AuthnRequest, found {}",
                root.local_name
            )));
        }

        let issue_instant = root
            .attribute("IssueInstant")
            .map(|value| {
                DateTime::parse_from_rfc3339(value.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| SamlError::InvalidRequest(format!("invalid IssueInstant: {e}")))
            })
            .transpose()?;

        let assertion_consumer_service_index = root
            .attribute("AssertionConsumerServiceIndex")
            .map(|value| parse_number::<u16>("AssertionConsumerServiceIndex", value))
            .transpose()?;

        let attribute_consuming_service_index = root
            .attribute("AttributeConsumingServiceIndex")
            .map(|value| parse_number::<i64>("AttributeConsumingServiceIndex", value))
            .transpose()?;

        Ok(Self {
            id: root.attribute("ID").unwrap_or_default().to_string(),
            version: root.attribute("Version").unwrap_or_default().to_string(),
            issue_instant,
            issuer: root.child(SAML_NS, "Issuer").map(NameId::from_element),
            assertion_consumer_service_url: owned(root.attribute("AssertionConsumerServiceURL")),
            assertion_consumer_service_index,
            destination: owned(root.attribute("Destination")),
            protocol_binding: owned(root.attribute("ProtocolBinding")),
            subject: root.child(SAML_NS, "Subject").map(Subject::from_element),
            name_id_policy: root
                .child(SAMLP_NS, "NameIDPolicy")
                .map(NameIdPolicy::from_element),
            requested_authn_context: root
                .child(SAMLP_NS, "RequestedAuthnContext")
                .map(RequestedAuthnContext::from_element),
            force_authn: parse_flag("ForceAuthn", root.attribute("ForceAuthn"))?,
            is_passive: parse_flag("IsPassive", root.attribute("IsPassive"))?,
            attribute_consuming_service_index,
            provider_name: owned(root.attribute("ProviderName")),
            consent: owned(root.attribute("Consent")),
            signature: root
                .child(XMLDSIG_NS, "Signature")
                .and_then(signature_from_element),
        })
    }
}

impl SignableDocument for AuthnRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn to_xml(&self) -> String {
        let mut out = format!(
            "<samlp:AuthnRequest xmlns:samlp=\"{SAMLP_NS}\" xmlns:saml=\"{SAML_NS}\" ID=\"{}\" Version=\"{}\"",
            escape(&self.id),
            escape(&self.version)
        );

        if let Some(instant) = &self.issue_instant {
            out.push_str(&format!(
                " IssueInstant=\"{}\"",
                instant.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }
        push_attribute(&mut out, "Destination", self.destination.as_deref());
        push_attribute(
            &mut out,
            "AssertionConsumerServiceURL",
            self.assertion_consumer_service_url.as_deref(),
        );
        if let Some(index) = self.assertion_consumer_service_index {
            out.push_str(&format!(" AssertionConsumerServiceIndex=\"{index}\""));
        }
        push_attribute(&mut out, "ProtocolBinding", self.protocol_binding.as_deref());
        if self.force_authn {
            out.push_str(" ForceAuthn=\"true\"");
        }
        if self.is_passive {
            out.push_str(" IsPassive=\"true\"");
        }
        if let Some(index) = self.attribute_consuming_service_index {
            out.push_str(&format!(" AttributeConsumingServiceIndex=\"{index}\""));
        }
        push_attribute(&mut out, "ProviderName", self.provider_name.as_deref());
        push_attribute(&mut out, "Consent", self.consent.as_deref());
        out.push('>');

        if let Some(issuer) = &self.issuer {
            issuer.write_xml(&mut out, "saml:Issuer");
        }
        if let Some(signature) = &self.signature {
            out.push_str(&signature.to_xml());
        }
        if let Some(subject) = &self.subject {
            subject.write_xml(&mut out);
        }
        if let Some(policy) = &self.name_id_policy {
            policy.write_xml(&mut out);
        }
        if let Some(context) = &self.requested_authn_context {
            context.write_xml(&mut out);
        }

        out.push_str("</samlp:AuthnRequest>");
        out
    }

    fn signature(&self) -> Option<&XmlSignature> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: Option<XmlSignature>) {
        self.signature = signature;
    }
}

/// The subject of an authentication request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// The subject's name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Subject confirmations, which an AuthnRequest must not carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a subject with the given name ID.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            name_id: Some(name_id),
            confirmations: Vec::new(),
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, method: impl Into<String>) -> Self {
        self.confirmations.push(SubjectConfirmation {
            method: method.into(),
        });
        self
    }

    fn from_element(element: &XmlElement) -> Self {
        Self {
            name_id: element.child(SAML_NS, "NameID").map(NameId::from_element),
            confirmations: element
                .children_named(SAML_NS, "SubjectConfirmation")
                .map(|e| SubjectConfirmation {
                    method: e.attribute("Method").unwrap_or_default().to_string(),
                })
                .collect(),
        }
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<saml:Subject>");
        if let Some(name_id) = &self.name_id {
            name_id.write_xml(out, "saml:NameID");
        }
        for confirmation in &self.confirmations {
            out.push_str(&format!(
                "<saml:SubjectConfirmation Method=\"{}\"/>",
                escape(&confirmation.method)
            ));
        }
        out.push_str("</saml:Subject>");
    }
}

/// A subject confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method URI.
    pub method: String,
}

/// Requested authentication context.
///
/// Specifies the authentication context requirements for the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    /// Comparison method for the authentication context.
    #[serde(default)]
    pub comparison: AuthnContextComparison,

    /// List of acceptable authentication context class references.
    #[serde(default)]
    pub authn_context_class_refs: Vec<String>,
}

impl RequestedAuthnContext {
    /// Creates a context requiring an exact match of a class reference.
    #[must_use]
    pub fn exact(class_ref: impl Into<String>) -> Self {
        Self {
            comparison: AuthnContextComparison::Exact,
            authn_context_class_refs: vec![class_ref.into()],
        }
    }

    /// Adds a class reference.
    #[must_use]
    pub fn with_class_ref(mut self, class_ref: impl Into<String>) -> Self {
        self.authn_context_class_refs.push(class_ref.into());
        self
    }

    /// Sets the comparison method.
    #[must_use]
    pub const fn with_comparison(mut self, comparison: AuthnContextComparison) -> Self {
        self.comparison = comparison;
        self
    }

    fn from_element(element: &XmlElement) -> Self {
        Self {
            comparison: element
                .attribute("Comparison")
                .and_then(AuthnContextComparison::from_str_opt)
                .unwrap_or_default(),
            authn_context_class_refs: element
                .children_named(SAML_NS, "AuthnContextClassRef")
                .map(|e| e.text().trim().to_string())
                .collect(),
        }
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str(&format!(
            "<samlp:RequestedAuthnContext Comparison=\"{}\">",
            self.comparison.as_str()
        ));
        for class_ref in &self.authn_context_class_refs {
            out.push_str("<saml:AuthnContextClassRef>");
            out.push_str(&escape(class_ref));
            out.push_str("</saml:AuthnContextClassRef>");
        }
        out.push_str("</samlp:RequestedAuthnContext>");
    }
}

/// Authentication context comparison methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger than any listed context.
    Better,
}

impl AuthnContextComparison {
    /// Returns the string value for this comparison.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    fn from_str_opt(value: &str) -> Option<Self> {
        match value.trim() {
            "exact" => Some(Self::Exact),
            "minimum" => Some(Self::Minimum),
            "maximum" => Some(Self::Maximum),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(String::from)
}

fn push_attribute(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str(&format!(" {name}=\"{}\"", escape(value)));
    }
}

fn parse_flag(name: &str, value: Option<&str>) -> SamlResult<bool> {
    match value.map(str::trim) {
        None | Some("false" | "0") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some(other) => Err(SamlError::InvalidRequest(format!(
            "{name} is not a boolean: {other}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> SamlResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SamlError::InvalidRequest(format!("{name} is not a valid number: {value}")))
}

fn signature_from_element(element: &XmlElement) -> Option<XmlSignature> {
    let signed_info = element.child(XMLDSIG_NS, "SignedInfo")?;
    let reference = signed_info.child(XMLDSIG_NS, "Reference")?;
    let compact = |e: &XmlElement| -> String {
        e.text().chars().filter(|c| !c.is_ascii_whitespace()).collect()
    };

    Some(XmlSignature {
        algorithm: signed_info
            .child(XMLDSIG_NS, "SignatureMethod")?
            .attribute("Algorithm")
            .and_then(SignatureAlgorithm::from_uri)?,
        digest_algorithm: reference
            .child(XMLDSIG_NS, "DigestMethod")?
            .attribute("Algorithm")
            .and_then(DigestAlgorithm::from_uri)?,
        reference_uri: reference.attribute("URI").unwrap_or_default().to_string(),
        digest_value: compact(reference.child(XMLDSIG_NS, "DigestValue")?),
        signature_value: compact(element.child(XMLDSIG_NS, "SignatureValue")?),
        x509_certificate: element
            .child(XMLDSIG_NS, "KeyInfo")
            .and_then(|k| k.child(XMLDSIG_NS, "X509Data"))
            .and_then(|d| d.child(XMLDSIG_NS, "X509Certificate"))
            .map(compact),
    })
}
