//! SOAP envelope model.
//!
//! The tree produced by [`crate::parser::parse_envelope`] for one request.
//! Known SOAP structure (Header, Body, Fault) gets its own type; anything else
//! is kept as a generic [`Element`] so vendor headers and fault details of any
//! depth survive decoding.

use std::collections::HashMap;
use std::fmt;

/// Qualified XML name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct XmlName {
    /// Resolved namespace URI, or the raw prefix when it was never declared
    pub namespace: Option<String>,
    /// Local part of the name
    pub local: String,
}

impl XmlName {
    /// Create a name without namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Create a namespaced name.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// An attribute with its unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttr {
    pub name: XmlName,
    pub value: String,
}

/// Generic XML element.
///
/// Used for every child the model has no dedicated type for. Attributes and
/// children keep document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: XmlName,
    pub attrs: Vec<XmlAttr>,
    /// Direct character data of this element (children's text excluded)
    pub content: String,
    pub children: Vec<Element>,
}

impl Element {
    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name.local == local)
    }

    /// Value of the first attribute with the given local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Depth of the subtree rooted here (a leaf is 1).
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Element::depth).max().unwrap_or(0)
    }
}

/// A nested header element.
pub type SubHeader = Element;

/// A nested fault detail element.
pub type SubDetail = Element;

/// Parsed SOAP message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Namespace declarations on the root element (prefix -> URI, default namespace under "")
    pub namespaces: HashMap<String, String>,
    pub header: Option<Header>,
    pub body: Option<Body>,
}

impl Envelope {
    /// Raw inner XML of the Body, if there is one.
    pub fn body_content(&self) -> Option<&[u8]> {
        self.body.as_ref().map(|b| b.content.as_slice())
    }

    /// Fault carried in the Body, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.body.as_ref().and_then(|b| b.fault.as_ref())
    }
}

/// SOAP Header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub name: XmlName,
    pub content: String,
    pub attrs: Vec<XmlAttr>,
    pub sub_headers: Vec<SubHeader>,
}

impl Header {
    /// First sub-header with the given local name.
    pub fn find(&self, local: &str) -> Option<&SubHeader> {
        self.sub_headers.iter().find(|h| h.name.local == local)
    }
}

impl From<Element> for Header {
    fn from(element: Element) -> Self {
        Self {
            name: element.name,
            content: element.content,
            attrs: element.attrs,
            sub_headers: element.children,
        }
    }
}

/// SOAP Body.
///
/// The payload stays opaque: `content` holds the exact bytes between the Body
/// start and end tags, for the handler to interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub content: Vec<u8>,
    pub fault: Option<Fault>,
}

impl Body {
    /// Element name of the Body.
    pub const NAME: &'static str = "Body";

    /// Body content as UTF-8 text.
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// SOAP 1.1 Fault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub string: String,
    pub actor: String,
    pub detail: Detail,
}

impl From<Element> for Fault {
    fn from(element: Element) -> Self {
        let mut fault = Fault::default();
        for child in element.children {
            match child.name.local.as_str() {
                "faultcode" => fault.code = child.content,
                "faultstring" => fault.string = child.content,
                "faultactor" => fault.actor = child.content,
                "detail" => fault.detail = Detail::from(child),
                _ => {}
            }
        }
        fault
    }
}

/// Fault detail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detail {
    pub name: XmlName,
    pub content: String,
    pub attrs: Vec<XmlAttr>,
    pub sub_faults: Vec<SubDetail>,
}

impl From<Element> for Detail {
    fn from(element: Element) -> Self {
        Self {
            name: element.name,
            content: element.content,
            attrs: element.attrs,
            sub_faults: element.children,
        }
    }
}
