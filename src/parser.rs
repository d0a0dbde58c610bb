//! SOAP envelope parsing.
//!
//! Uses quick-xml's namespace-aware reader, which never expands external
//! entities. The document is read into a generic [`Element`] tree with an
//! explicit stack, so nesting depth is bounded by configuration rather than by
//! the call stack, and the Body's inner bytes are sliced straight out of the
//! input.

use std::collections::HashMap;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::envelope::{Body, Element, Envelope, Fault, Header, XmlAttr, XmlName};
use crate::error::ParseError;

/// Default limit on element nesting.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Parse raw bytes as a SOAP envelope with default limits.
pub fn parse_envelope(data: &[u8]) -> Result<Envelope, ParseError> {
    EnvelopeParser::default().parse(data)
}

/// Envelope parser with a nesting limit.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParser {
    max_depth: u32,
}

impl Default for EnvelopeParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Root element plus what the envelope needs from the raw input.
struct Document {
    root: Element,
    namespaces: HashMap<String, String>,
    body_span: Option<Range<usize>>,
}

/// An element still waiting for its end tag.
struct Frame {
    element: Element,
    inner_start: usize,
}

impl EnvelopeParser {
    /// Create a parser that rejects documents nested deeper than `max_depth`.
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Maximum accepted nesting depth.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Parse raw bytes as a SOAP envelope.
    ///
    /// The root element's name is not checked. `Header` and `Body` are picked
    /// from the root's children by local name; if either appears twice, the
    /// last one wins.
    pub fn parse(&self, data: &[u8]) -> Result<Envelope, ParseError> {
        let document = self.read_document(data)?;

        let mut envelope = Envelope {
            namespaces: document.namespaces,
            ..Default::default()
        };

        for child in document.root.children {
            match child.name.local.as_str() {
                "Header" => envelope.header = Some(Header::from(child)),
                Body::NAME => {
                    let fault = child
                        .children
                        .into_iter()
                        .filter(|c| c.name.local == "Fault")
                        .last()
                        .map(Fault::from);
                    let content = document
                        .body_span
                        .clone()
                        .and_then(|span| data.get(span))
                        .map(<[u8]>::to_vec)
                        .unwrap_or_default();
                    envelope.body = Some(Body { content, fault });
                }
                _ => {}
            }
        }

        Ok(envelope)
    }

    fn read_document(&self, data: &[u8]) -> Result<Document, ParseError> {
        let mut reader = NsReader::from_reader(data);
        let mut stack: Vec<Frame> = Vec::new();
        let mut namespaces = HashMap::new();
        let mut body_span = None;

        loop {
            let position = reader.buffer_position() as usize;
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|source| ParseError::Syntax { position, source })?;
            let namespace = namespace_of(resolved, position)?;

            match event {
                Event::Start(start) => {
                    self.check_depth(stack.len() + 1)?;
                    let element = open_element(&reader, &start, namespace, position)?;
                    if stack.is_empty() {
                        namespaces = namespace_declarations(&start, position)?;
                    }
                    stack.push(Frame {
                        element,
                        inner_start: reader.buffer_position() as usize,
                    });
                }

                Event::Empty(start) => {
                    self.check_depth(stack.len() + 1)?;
                    let element = open_element(&reader, &start, namespace, position)?;
                    if stack.len() == 1 && element.name.local == Body::NAME {
                        body_span = Some(position..position);
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.element.children.push(element),
                        None => {
                            return Ok(Document {
                                root: element,
                                namespaces: namespace_declarations(&start, position)?,
                                body_span: None,
                            });
                        }
                    }
                }

                Event::End(_) => {
                    let frame = stack.pop().ok_or(ParseError::UnmatchedEnd(position))?;
                    if stack.len() == 1 && frame.element.name.local == Body::NAME {
                        body_span = Some(frame.inner_start..position);
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.element.children.push(frame.element),
                        None => {
                            return Ok(Document {
                                root: frame.element,
                                namespaces,
                                body_span,
                            });
                        }
                    }
                }

                Event::Text(text) => {
                    if let Some(frame) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| ParseError::Syntax {
                                position,
                                source: e.into(),
                            })?;
                        frame.element.content.push_str(&text);
                    }
                }

                Event::CData(cdata) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.element.content.push_str(utf8(&cdata, position)?);
                    }
                }

                Event::Eof => {
                    return Err(match stack.last() {
                        Some(frame) => ParseError::Unclosed(frame.element.name.local.clone()),
                        None => ParseError::Empty,
                    });
                }

                // Declarations, comments, processing instructions and DOCTYPE
                // carry nothing the envelope models.
                _ => {}
            }
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.max_depth as usize {
            return Err(ParseError::DepthExceeded(self.max_depth));
        }
        Ok(())
    }
}

/// Build an element (no children yet) from a start tag.
fn open_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
    position: usize,
) -> Result<Element, ParseError> {
    let local_name = start.local_name();
    let name = XmlName {
        namespace,
        local: utf8(local_name.as_ref(), position)?.to_string(),
    };

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Syntax {
            position,
            source: e.into(),
        })?;
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = namespace_of(resolved, position)?;
        let local = utf8(local.as_ref(), position)?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::Syntax {
                position,
                source: e.into(),
            })?
            .into_owned();
        attrs.push(XmlAttr {
            name: XmlName { namespace, local },
            value,
        });
    }

    Ok(Element {
        name,
        attrs,
        ..Default::default()
    })
}

/// Collect `xmlns` and `xmlns:prefix` declarations of a start tag.
fn namespace_declarations(
    start: &BytesStart<'_>,
    position: usize,
) -> Result<HashMap<String, String>, ParseError> {
    let mut namespaces = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::Syntax {
            position,
            source: e.into(),
        })?;
        let key = attr.key.as_ref();
        let prefix = if key == b"xmlns" {
            ""
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            utf8(prefix, position)?
        } else {
            continue;
        };
        let uri = attr.unescape_value().map_err(|e| ParseError::Syntax {
            position,
            source: e.into(),
        })?;
        namespaces.insert(prefix.to_string(), uri.into_owned());
    }
    Ok(namespaces)
}

/// Namespace URI for a resolved name. Undeclared prefixes are kept as-is.
fn namespace_of(resolved: ResolveResult<'_>, position: usize) -> Result<Option<String>, ParseError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref(), position)?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Ok(Some(utf8(&prefix, position)?.to_string())),
    }
}

fn utf8(bytes: &[u8], position: usize) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|source| ParseError::Utf8 { position, source })
}
