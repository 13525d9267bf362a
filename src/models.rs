//! Core data models for Solr responses and indexable content.
//!
//! [`SolrValue`] is the variant type every parsed element decodes into: scalar
//! leaves plus the four composite containers the wire format nests
//! (`arr`, `lst`, `result`, `doc`). [`ContentItem`] is the opaque indexable
//! node a content source hands to the indexing pipeline.

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;

/// A typed value decoded from a Solr XML element.
///
/// Composite variants own their children exclusively; a node never appears in
/// two trees. Leaves are immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum SolrValue {
    Null,
    /// `int` and `long` wire tags.
    Int(i64),
    /// `float` and `double` wire tags.
    Float(f64),
    Bool(bool),
    /// Never null: absent text decodes to the empty string.
    Str(String),
    Date(DateTime<FixedOffset>),
    /// Order-preserving `arr` container.
    List(Vec<SolrValue>),
    /// Named-value `lst` container.
    Map(HashMap<String, SolrValue>),
    /// `doc` container with attribute-style field access.
    Doc(SolrDoc),
    /// `result` container: a document list plus sibling metadata.
    Results(SolrResults),
}

impl SolrValue {
    /// Short tag-like name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SolrValue::Null => "null",
            SolrValue::Int(_) => "int",
            SolrValue::Float(_) => "float",
            SolrValue::Bool(_) => "bool",
            SolrValue::Str(_) => "str",
            SolrValue::Date(_) => "date",
            SolrValue::List(_) => "list",
            SolrValue::Map(_) => "map",
            SolrValue::Doc(_) => "doc",
            SolrValue::Results(_) => "results",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SolrValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SolrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SolrValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SolrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SolrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            SolrValue::Date(d) => Some(d),
            _ => None,
        }
    }
}

/// A search-result document: named fields plus extra attributes carried on
/// its opening tag.
///
/// `open_access` marks documents the host framework may expose to untrusted
/// templates without further protection checks. The parser sets it on every
/// document it builds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolrDoc {
    fields: HashMap<String, SolrValue>,
    attrs: HashMap<String, String>,
    pub open_access: bool,
}

impl SolrDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document flagged for unprotected field access.
    pub fn open() -> Self {
        Self {
            open_access: true,
            ..Self::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&SolrValue> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: String, value: SolrValue) {
        self.fields.insert(name, value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SolrValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_string(), value.to_string());
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// A list of result documents with the metadata attributes of its opening
/// `result` tag (`numFound`, `start`, `maxScore`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolrResults {
    items: Vec<SolrValue>,
    attrs: HashMap<String, String>,
}

impl SolrResults {
    pub fn push(&mut self, value: SolrValue) {
        self.items.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&SolrValue> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SolrValue> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_string(), value.to_string());
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Total match count reported by the service, which may exceed the number
    /// of documents actually returned in this page.
    pub fn num_found(&self) -> Option<u64> {
        self.attr("numFound").and_then(|v| v.parse().ok())
    }

    pub fn start(&self) -> Option<u64> {
        self.attr("start").and_then(|v| v.parse().ok())
    }
}

/// An indexable node produced by a content source.
///
/// `fields` carries the flat name → value map submitted to the indexing
/// service; the service's schema decides which of them survive.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub title: Option<String>,
    pub content_type: String,
    pub modified: DateTime<Utc>,
    pub fields: HashMap<String, String>,
}
