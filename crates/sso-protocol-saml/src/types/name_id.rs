//! SAML Name ID types.
//!
//! Name identifiers are used for the `Issuer` of a request and for the
//! subject a service provider asks to have authenticated.

use serde::{Deserialize, Serialize};

use super::NameIdFormat;
use crate::xml::{escape, XmlElement};

/// SAML Name ID.
///
/// Shared by `saml:Issuer` and `saml:NameID`, which have the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The identifier value, with surrounding whitespace removed.
    pub value: String,

    /// The format of the name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,

    /// An identifier established by the service provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Creates an issuer name ID in the entity format.
    #[must_use]
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id).with_format(NameIdFormat::Entity)
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets a raw format URI, which need not be a known format.
    #[must_use]
    pub fn with_format_uri(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the SP-provided identifier.
    #[must_use]
    pub fn with_sp_provided_id(mut self, id: impl Into<String>) -> Self {
        self.sp_provided_id = Some(id.into());
        self
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Reads a name ID from a parsed `Issuer` or `NameID` element.
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        Self {
            value: element.text().trim().to_string(),
            format: element.attribute("Format").map(String::from),
            name_qualifier: element.attribute("NameQualifier").map(String::from),
            sp_name_qualifier: element.attribute("SPNameQualifier").map(String::from),
            sp_provided_id: element.attribute("SPProvidedID").map(String::from),
        }
    }

    /// Appends this name ID as an element with the given qualified name.
    pub fn write_xml(&self, out: &mut String, qname: &str) {
        out.push('<');
        out.push_str(qname);
        for (name, value) in [
            ("Format", &self.format),
            ("NameQualifier", &self.name_qualifier),
            ("SPNameQualifier", &self.sp_name_qualifier),
            ("SPProvidedID", &self.sp_provided_id),
        ] {
            if let Some(value) = value {
                out.push_str(&format!(" {name}=\"{}\"", escape(value)));
            }
        }
        out.push('>');
        out.push_str(&escape(&self.value));
        out.push_str("</");
        out.push_str(qname);
        out.push('>');
    }
}

/// Name ID policy for authentication requests.
///
/// Specifies constraints on the name identifier to be returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// The requested name ID format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The SP name qualifier for the name ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,

    /// Whether a new identifier may be created for this request.
    #[serde(default)]
    pub allow_create: bool,
}

impl NameIdPolicy {
    /// Creates a policy requesting a specific format.
    #[must_use]
    pub fn with_format(format: NameIdFormat) -> Self {
        Self {
            format: Some(format.uri().to_string()),
            ..Self::default()
        }
    }

    /// Sets whether new identifiers can be created.
    #[must_use]
    pub const fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = allow;
        self
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> Option<NameIdFormat> {
        self.format.as_deref().and_then(NameIdFormat::from_uri)
    }

    /// Reads a policy from a parsed `NameIDPolicy` element.
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        Self {
            format: element.attribute("Format").map(String::from),
            sp_name_qualifier: element.attribute("SPNameQualifier").map(String::from),
            allow_create: element
                .attribute("AllowCreate")
                .is_some_and(|v| matches!(v.trim(), "true" | "1")),
        }
    }

    /// Appends this policy as a `samlp:NameIDPolicy` element.
    pub fn write_xml(&self, out: &mut String) {
        out.push_str("<samlp:NameIDPolicy");
        if let Some(format) = &self.format {
            out.push_str(&format!(" Format=\"{}\"", escape(format)));
        }
        if let Some(qualifier) = &self.sp_name_qualifier {
            out.push_str(&format!(" SPNameQualifier=\"{}\"", escape(qualifier)));
        }
        if self.allow_create {
            out.push_str(" AllowCreate=\"true\"");
        }
        out.push_str("/>");
    }
}
