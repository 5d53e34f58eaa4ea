//! Exclusive XML Canonicalization 1.0, without comments.
//!
//! Operates on a parsed [`XmlElement`] subtree. A namespace declaration is
//! emitted on an element only when the element or one of its attributes
//! visibly uses the prefix and the nearest output ancestor has not already
//! rendered the same binding. Comments are never part of the parsed tree, so
//! they never appear in the output.

use std::collections::BTreeMap;

use crate::types::{XMLDSIG_NS, XML_NS};

use super::{XmlElement, XmlNode};

/// Canonicalizes the subtree rooted at `element`.
#[must_use]
pub fn canonicalize(element: &XmlElement) -> String {
    let mut out = String::new();
    write_element(&mut out, element, &BTreeMap::new(), false);
    out
}

/// Canonicalizes the subtree rooted at `element`, omitting its enveloped
/// `ds:Signature` children.
#[must_use]
pub fn canonicalize_without_signature(element: &XmlElement) -> String {
    let mut out = String::new();
    write_element(&mut out, element, &BTreeMap::new(), true);
    out
}

fn write_element(
    out: &mut String,
    element: &XmlElement,
    rendered: &BTreeMap<String, String>,
    skip_signature: bool,
) {
    let mut declarations: BTreeMap<String, String> = BTreeMap::new();

    let mut utilize = |prefix: &str, uri: &str| {
        let current = rendered.get(prefix).map_or("", String::as_str);
        if current != uri {
            declarations.insert(prefix.to_string(), uri.to_string());
        }
    };

    utilize(
        element.prefix.as_deref().unwrap_or(""),
        element.namespace.as_deref().unwrap_or(""),
    );
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (attr.prefix.as_deref(), attr.namespace.as_deref()) {
            if uri != XML_NS {
                utilize(prefix, uri);
            }
        }
    }

    let qname = qualified_name(element.prefix.as_deref(), &element.local_name);
    out.push('<');
    out.push_str(&qname);

    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(out, uri);
        out.push('"');
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_key = (a.namespace.as_deref().unwrap_or(""), a.local_name.as_str());
        let b_key = (b.namespace.as_deref().unwrap_or(""), b.local_name.as_str());
        a_key.cmp(&b_key)
    });
    for attr in attributes {
        out.push(' ');
        out.push_str(&qualified_name(attr.prefix.as_deref(), &attr.local_name));
        out.push_str("=\"");
        escape_attribute(out, &attr.value);
        out.push('"');
    }
    out.push('>');

    let mut in_scope = rendered.clone();
    in_scope.extend(declarations);

    for child in &element.children {
        match child {
            XmlNode::Element(e) if skip_signature && e.is(XMLDSIG_NS, "Signature") => {}
            XmlNode::Element(e) => write_element(out, e, &in_scope, false),
            XmlNode::Text(text) => escape_text(out, text),
            XmlNode::ProcessingInstruction(pi) => {
                out.push_str("<?");
                out.push_str(pi);
                out.push_str("?>");
            }
        }
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}

fn qualified_name(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
