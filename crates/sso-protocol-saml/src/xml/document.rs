//! Owned, namespace-resolved XML tree built from quick-xml events.
//!
//! The parser never expands entities beyond the five predefined ones and
//! character references. Any document type declaration is rejected outright,
//! so external and internal entity definitions cannot be introduced.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DecodeError;
use crate::types::XML_NS;

/// Maximum element nesting accepted from untrusted input.
pub const MAX_DEPTH: usize = 128;

/// A namespace binding introduced by an `xmlns` attribute.
type NsBinding = (Option<String>, String);

/// A parsed XML element with resolved namespace names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// The prefix used in the source document.
    pub prefix: Option<String>,
    /// The local part of the element name.
    pub local_name: String,
    /// The namespace URI the prefix resolved to.
    pub namespace: Option<String>,
    /// Attributes other than namespace declarations, in document order.
    pub attributes: Vec<XmlAttribute>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

/// A parsed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// The prefix used in the source document.
    pub prefix: Option<String>,
    /// The local part of the attribute name.
    pub local_name: String,
    /// The namespace URI of a prefixed attribute.
    pub namespace: Option<String>,
    /// The unescaped attribute value.
    pub value: String,
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// A child element.
    Element(XmlElement),
    /// Character data, already unescaped.
    Text(String),
    /// A processing instruction, stored as `target data`.
    ProcessingInstruction(String),
}

impl XmlElement {
    /// Parses a complete document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::DtdForbidden`] if a DOCTYPE is present and
    /// [`DecodeError::Xml`] for malformed input, undeclared prefixes,
    /// unknown entity references or excessive nesting.
    pub fn parse(xml: &str) -> Result<Self, DecodeError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut scopes: Vec<Vec<NsBinding>> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::DocType(_) => return Err(DecodeError::DtdForbidden),
                Event::Start(e) => {
                    let element = open_element(&e, &mut scopes, root.is_some())?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = open_element(&e, &mut scopes, root.is_some())?;
                    scopes.pop();
                    close_element(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    scopes.pop();
                    let element = stack
                        .pop()
                        .ok_or_else(|| DecodeError::Xml("unexpected end tag".to_string()))?;
                    close_element(element, &mut stack, &mut root);
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(c) => {
                    let text = std::str::from_utf8(&c)?;
                    push_text(&mut stack, text)?;
                }
                Event::PI(pi) => {
                    if let Some(parent) = stack.last_mut() {
                        let content = std::str::from_utf8(&pi)?;
                        parent
                            .children
                            .push(XmlNode::ProcessingInstruction(content.to_string()));
                    }
                }
                Event::Comment(_) | Event::Decl(_) => {}
                Event::Eof => break,
            }

            if stack.len() > MAX_DEPTH {
                return Err(DecodeError::Xml(format!(
                    "element nesting exceeds {MAX_DEPTH} levels"
                )));
            }
        }

        if !stack.is_empty() {
            return Err(DecodeError::Xml("unclosed element at end of document".to_string()));
        }

        root.ok_or_else(|| DecodeError::Xml("document has no root element".to_string()))
    }

    /// Returns true if this element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns the value of an unqualified attribute.
    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Iterates over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child_elements()
            .filter(move |e| e.is(namespace, local_name))
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.is(namespace, local_name))
    }

    /// Returns the concatenated character data of direct children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Finds the first element in document order, starting with `self`,
    /// matching the predicate.
    pub fn find<P>(&self, predicate: &P) -> Option<&XmlElement>
    where
        P: Fn(&XmlElement) -> bool,
    {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(predicate))
    }

    /// Finds the element carrying the given `ID` (or `Id`) attribute.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&XmlElement> {
        self.find(&|e: &XmlElement| {
            e.attribute("ID").or_else(|| e.attribute("Id")) == Some(id)
        })
    }
}

fn open_element(
    start: &BytesStart<'_>,
    scopes: &mut Vec<Vec<NsBinding>>,
    root_closed: bool,
) -> Result<XmlElement, DecodeError> {
    if root_closed && scopes.is_empty() {
        return Err(DecodeError::Xml("multiple root elements".to_string()));
    }

    let mut bindings = Vec::new();
    let mut raw_attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();

        if key == "xmlns" {
            bindings.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            bindings.push((Some(prefix.to_string()), value));
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(bindings);

    let qname = std::str::from_utf8(start.name().as_ref())?.to_string();
    let (prefix, local_name) = split_qname(&qname);
    let namespace = resolve(scopes, prefix)?;

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attr_prefix, attr_local) = split_qname(&key);
        let attr_namespace = match attr_prefix {
            Some(_) => resolve(scopes, attr_prefix)?,
            None => None,
        };
        attributes.push(XmlAttribute {
            prefix: attr_prefix.map(String::from),
            local_name: attr_local.to_string(),
            namespace: attr_namespace,
            value,
        });
    }

    Ok(XmlElement {
        prefix: prefix.map(String::from),
        local_name: local_name.to_string(),
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn close_element(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => {
            match parent.children.last_mut() {
                Some(XmlNode::Text(existing)) => existing.push_str(text),
                _ => parent.children.push(XmlNode::Text(text.to_string())),
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(DecodeError::Xml(
            "character data outside the root element".to_string(),
        )),
    }
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn resolve(scopes: &[Vec<NsBinding>], prefix: Option<&str>) -> Result<Option<String>, DecodeError> {
    if prefix == Some("xml") {
        return Ok(Some(XML_NS.to_string()));
    }

    let binding = scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(p, _)| p.as_deref() == prefix);

    match (binding, prefix) {
        (Some((_, uri)), _) if uri.is_empty() => Ok(None),
        (Some((_, uri)), _) => Ok(Some(uri.clone())),
        (None, None) => Ok(None),
        (None, Some(p)) => Err(DecodeError::Xml(format!(
            "undeclared namespace prefix '{p}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SAMLP_NS, SAML_NS};

    #[test]
    fn resolves_namespaces() {
        let xml = r#"<?xml version="1.0"?>
<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_1">
  <Issuer xmlns="urn:oasis:names:tc:SAML:2.0:assertion">sp</Issuer>
</samlp:AuthnRequest>"#;
        let root = XmlElement::parse(xml).unwrap();

        assert!(root.is(SAMLP_NS, "AuthnRequest"));
        assert_eq!(root.attribute("ID"), Some("_1"));
        let issuer = root.child(SAML_NS, "Issuer").unwrap();
        assert_eq!(issuer.text(), "sp");
        assert_eq!(issuer.prefix, None);
    }

    #[test]
    fn rejects_doctype() {
        let xml = r#"<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]><foo>&xxe;</foo>"#;
        assert!(matches!(
            XmlElement::parse(xml),
            Err(DecodeError::DtdForbidden)
        ));
    }

    #[test]
    fn rejects_unknown_entity() {
        let xml = "<foo>&xxe;</foo>";
        assert!(matches!(XmlElement::parse(xml), Err(DecodeError::Xml(_))));
    }

    #[test]
    fn unescapes_predefined_entities() {
        let root = XmlElement::parse(r#"<a b="&quot;x&quot;">&lt;&amp;&#65;</a>"#).unwrap();
        assert_eq!(root.attribute("b"), Some("\"x\""));
        assert_eq!(root.text(), "<&A");
    }

    #[test]
    fn rejects_undeclared_prefix() {
        assert!(matches!(
            XmlElement::parse("<p:a/>"),
            Err(DecodeError::Xml(_))
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(XmlElement::parse("<a/><b/>").is_err());
        assert!(XmlElement::parse("<a/>text").is_err());
        assert!(XmlElement::parse("<a>").is_err());
        assert!(XmlElement::parse("").is_err());
    }

    #[test]
    fn rejects_deep_nesting() {
        let depth = MAX_DEPTH + 1;
        let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        assert!(matches!(XmlElement::parse(&xml), Err(DecodeError::Xml(_))));
    }

    #[test]
    fn finds_element_by_id() {
        let root = XmlElement::parse(r#"<a><b ID="x"/><c Id="y"/></a>"#).unwrap();
        assert_eq!(root.find_by_id("x").unwrap().local_name, "b");
        assert_eq!(root.find_by_id("y").unwrap().local_name, "c");
        assert!(root.find_by_id("z").is_none());
    }
}
