//! Single-pass streaming deserializer for Solr XML documents.
//!
//! [`ElementReader`] normalizes quick-xml events into start/end element events
//! that carry the element's own attributes and accumulated text, keeping only
//! the stack of currently open elements in memory. [`parse_tree`] runs a stack
//! machine over those events, driven by two dispatch tables:
//!
//! - a *nesting table* mapping tag names to container factories, and
//! - a *leaf table* mapping tag names to scalar decoders.
//!
//! Tags in neither table are skipped, so documents with unknown vocabulary
//! still parse. The pass is O(document size) time and O(nesting depth) space;
//! documents larger than memory stream through without buffering.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::BufRead;

use crate::models::{SolrDoc, SolrValue};

/// Parse failure. All variants abort the parse; none are recovered internally.
#[derive(Debug)]
pub enum ParseError {
    /// Malformed XML in the underlying byte stream.
    Syntax(String),
    /// A leaf element's text did not decode as its tag's type.
    Decode(String),
    /// A value was attached to a container that cannot hold it. Indicates a
    /// misconfigured dispatch table, never silently coerced.
    Invariant(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax(e) => write!(f, "malformed document: {}", e),
            ParseError::Decode(e) => write!(f, "undecodable value: {}", e),
            ParseError::Invariant(e) => write!(f, "invariant violation: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

/// Zero-argument factory producing a fresh empty container.
pub type ContainerFactory = fn() -> SolrValue;
/// Decoder turning a leaf element's text (None when the element was empty)
/// into a typed value.
pub type LeafDecoder = fn(Option<&str>) -> Result<SolrValue, ParseError>;

pub type NestingTable = HashMap<&'static str, ContainerFactory>;
pub type LeafTable = HashMap<&'static str, LeafDecoder>;

/// A normalized element event.
///
/// Unlike raw XML end tags, `End` carries the attributes of the matching
/// start tag and the element's accumulated text, so a consumer never has to
/// track open elements itself.
#[derive(Debug)]
pub enum ElementEvent {
    Start {
        tag: String,
        attrs: HashMap<String, String>,
    },
    End {
        tag: String,
        attrs: HashMap<String, String>,
        text: Option<String>,
    },
}

struct Frame {
    tag: String,
    attrs: HashMap<String, String>,
    text: Option<String>,
}

/// Forward-only element event stream over any buffered reader.
pub struct ElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    frames: Vec<Frame>,
    // Self-closing elements yield a Start, then this End on the next call.
    pending_end: Option<(String, HashMap<String, String>)>,
}

impl<R: BufRead> ElementReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            frames: Vec::new(),
            pending_end: None,
        }
    }

    /// Next element event, or `None` at end of document.
    pub fn next_event(&mut self) -> Result<Option<ElementEvent>, ParseError> {
        if let Some((tag, attrs)) = self.pending_end.take() {
            return Ok(Some(ElementEvent::End {
                tag,
                attrs,
                text: None,
            }));
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    let tag = tag_name(&e);
                    let attrs = read_attrs(&e)?;
                    self.frames.push(Frame {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                        text: None,
                    });
                    return Ok(Some(ElementEvent::Start { tag, attrs }));
                }
                Ok(Event::Empty(e)) => {
                    let tag = tag_name(&e);
                    let attrs = read_attrs(&e)?;
                    self.pending_end = Some((tag.clone(), attrs.clone()));
                    return Ok(Some(ElementEvent::Start { tag, attrs }));
                }
                Ok(Event::End(_)) => {
                    let frame = self
                        .frames
                        .pop()
                        .ok_or_else(|| ParseError::Syntax("unexpected closing tag".to_string()))?;
                    return Ok(Some(ElementEvent::End {
                        tag: frame.tag,
                        attrs: frame.attrs,
                        text: frame.text,
                    }));
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ParseError::Syntax(e.to_string()))?;
                    if let Some(frame) = self.frames.last_mut() {
                        frame.text.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Ok(Event::CData(t)) => {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    if let Some(frame) = self.frames.last_mut() {
                        frame.text.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Ok(Event::Eof) => {
                    if !self.frames.is_empty() {
                        return Err(ParseError::Syntax(format!(
                            "unexpected end of document inside <{}>",
                            self.frames[self.frames.len() - 1].tag
                        )));
                    }
                    return Ok(None);
                }
                Ok(_) => {} // declaration, comment, processing instruction
                Err(e) => return Err(ParseError::Syntax(e.to_string())),
            }
        }
    }
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn read_attrs(e: &BytesStart) -> Result<HashMap<String, String>, ParseError> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ParseError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::Syntax(e.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Attach `value` to `container` under `name`, respecting the container's
/// shape: lists append and ignore the name, maps and documents require one.
pub fn set(
    container: &mut SolrValue,
    name: Option<&str>,
    value: SolrValue,
) -> Result<(), ParseError> {
    match container {
        SolrValue::List(items) => {
            items.push(value);
            Ok(())
        }
        SolrValue::Results(results) => {
            results.push(value);
            Ok(())
        }
        SolrValue::Map(map) => {
            map.insert(require_name(name)?.to_string(), value);
            Ok(())
        }
        SolrValue::Doc(doc) => {
            doc.insert(require_name(name)?.to_string(), value);
            Ok(())
        }
        other => Err(ParseError::Invariant(format!(
            "cannot attach a child to a {} node",
            other.kind()
        ))),
    }
}

fn require_name(name: Option<&str>) -> Result<&str, ParseError> {
    match name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ParseError::Invariant(
            "child of a named container has no name attribute".to_string(),
        )),
    }
}

fn attach_attr(container: &mut SolrValue, key: &str, value: &str) -> Result<(), ParseError> {
    match container {
        SolrValue::Doc(doc) => {
            doc.set_attr(key, value);
            Ok(())
        }
        SolrValue::Results(results) => {
            results.set_attr(key, value);
            Ok(())
        }
        other => Err(ParseError::Invariant(format!(
            "{} containers do not carry extra attributes (got {}=\"{}\")",
            other.kind(),
            key,
            value
        ))),
    }
}

/// Parse a tag-structured document into a typed tree.
///
/// The synthetic root is a [`SolrDoc`]; top-level named values become its
/// fields. Containers open and close per the nesting table, leaves decode per
/// the leaf table, and everything else is skipped.
pub fn parse_tree<R: BufRead>(
    source: R,
    nesting: &NestingTable,
    leaves: &LeafTable,
) -> Result<SolrDoc, ParseError> {
    let mut reader = ElementReader::new(source);
    let mut stack: Vec<SolrValue> = vec![SolrValue::Doc(SolrDoc::open())];
    while let Some(event) = reader.next_event()? {
        match event {
            ElementEvent::Start { tag, attrs } => {
                if let Some(factory) = nesting.get(tag.as_str()) {
                    let mut container = factory();
                    for (key, value) in &attrs {
                        if key != "name" {
                            attach_attr(&mut container, key, value)?;
                        }
                    }
                    stack.push(container);
                }
            }
            ElementEvent::End { tag, attrs, text } => {
                if nesting.contains_key(tag.as_str()) {
                    let value = stack.pop().ok_or_else(|| {
                        ParseError::Invariant("container stack underflow".to_string())
                    })?;
                    let top = stack.last_mut().ok_or_else(|| {
                        ParseError::Invariant("container closed with no parent".to_string())
                    })?;
                    set(top, attrs.get("name").map(String::as_str), value)?;
                } else if let Some(decoder) = leaves.get(tag.as_str()) {
                    let value = decoder(text.as_deref())?;
                    let top = stack.last_mut().ok_or_else(|| {
                        ParseError::Invariant("leaf decoded with no open container".to_string())
                    })?;
                    set(top, attrs.get("name").map(String::as_str), value)?;
                }
            }
        }
    }
    match (stack.pop(), stack.is_empty()) {
        (Some(SolrValue::Doc(root)), true) => Ok(root),
        _ => Err(ParseError::Syntax(
            "unbalanced container nesting".to_string(),
        )),
    }
}

// Leaf decoders. `int` and `long` share one decoder, as do `float` and
// `double`: both wire tags map to the same native width.

pub fn decode_null(_text: Option<&str>) -> Result<SolrValue, ParseError> {
    Ok(SolrValue::Null)
}

pub fn decode_int(text: Option<&str>) -> Result<SolrValue, ParseError> {
    let raw = text.ok_or_else(|| ParseError::Decode("empty int element".to_string()))?;
    raw.trim()
        .parse()
        .map(SolrValue::Int)
        .map_err(|_| ParseError::Decode(format!("invalid int literal {:?}", raw)))
}

pub fn decode_float(text: Option<&str>) -> Result<SolrValue, ParseError> {
    let raw = text.ok_or_else(|| ParseError::Decode("empty float element".to_string()))?;
    raw.trim()
        .parse()
        .map(SolrValue::Float)
        .map_err(|_| ParseError::Decode(format!("invalid float literal {:?}", raw)))
}

pub fn decode_bool(text: Option<&str>) -> Result<SolrValue, ParseError> {
    Ok(SolrValue::Bool(text == Some("true")))
}

/// Absent text decodes to the empty string, never to null.
pub fn decode_str(text: Option<&str>) -> Result<SolrValue, ParseError> {
    Ok(SolrValue::Str(text.unwrap_or_default().to_string()))
}

/// Decode an RFC 3339 timestamp, re-padding the year first: some Solr
/// versions strip leading zeros from the year, so `5-06-21T...` means year
/// 0005.
pub fn decode_date(text: Option<&str>) -> Result<SolrValue, ParseError> {
    let raw = text.ok_or_else(|| ParseError::Decode("empty date element".to_string()))?;
    let padded = pad_year(raw.trim())?;
    chrono::DateTime::parse_from_rfc3339(&padded)
        .map(SolrValue::Date)
        .map_err(|e| ParseError::Decode(format!("invalid date literal {:?}: {}", raw, e)))
}

fn pad_year(value: &str) -> Result<String, ParseError> {
    match value.find('-') {
        Some(pos) if pos < 4 => {
            let (year, rest) = value.split_at(pos);
            let year: u32 = year
                .parse()
                .map_err(|_| ParseError::Decode(format!("invalid year in date {:?}", value)))?;
            Ok(format!("{:04}{}", year, rest))
        }
        _ => Ok(value.to_string()),
    }
}
