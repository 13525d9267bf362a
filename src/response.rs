//! Search-response model.
//!
//! Parses the nested response envelope with the generic dispatch tables and
//! exposes the result list the query layer and the reindexing pipeline both
//! navigate. A response without a `response` result set (e.g. an error
//! payload) yields an empty result list, not an error.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::BufRead;

use crate::models::{SolrDoc, SolrResults, SolrValue};
use crate::parser::{self, parse_tree, LeafTable, NestingTable, ParseError};

/// Container factories for the response vocabulary.
pub static NESTING: Lazy<NestingTable> = Lazy::new(|| {
    let mut table: NestingTable = HashMap::new();
    table.insert("arr", || SolrValue::List(Vec::new()));
    table.insert("lst", || SolrValue::Map(HashMap::new()));
    table.insert("result", || SolrValue::Results(SolrResults::default()));
    table.insert("doc", || SolrValue::Doc(SolrDoc::open()));
    table
});

/// Scalar decoders for the response vocabulary.
pub static LEAVES: Lazy<LeafTable> = Lazy::new(|| {
    let mut table: LeafTable = HashMap::new();
    table.insert("null", parser::decode_null as parser::LeafDecoder);
    table.insert("int", parser::decode_int);
    table.insert("long", parser::decode_int);
    table.insert("float", parser::decode_float);
    table.insert("double", parser::decode_float);
    table.insert("bool", parser::decode_bool);
    table.insert("str", parser::decode_str);
    table.insert("date", parser::decode_date);
    table
});

static EMPTY_RESULTS: Lazy<SolrResults> = Lazy::new(SolrResults::default);

/// A parsed search response. Read-only after [`SolrResponse::parse`] returns;
/// reparsing always produces a fresh instance.
#[derive(Debug, Clone)]
pub struct SolrResponse {
    root: SolrDoc,
}

impl SolrResponse {
    pub fn parse<R: BufRead>(source: R) -> Result<Self, ParseError> {
        Ok(Self {
            root: parse_tree(source, &NESTING, &LEAVES)?,
        })
    }

    /// The result list bound to the top-level `response` key, or an empty
    /// list when the response carried none.
    pub fn results(&self) -> &SolrResults {
        match self.root.field("response") {
            Some(SolrValue::Results(results)) => results,
            _ => &EMPTY_RESULTS,
        }
    }

    /// The `responseHeader` map, when present.
    pub fn header(&self) -> Option<&HashMap<String, SolrValue>> {
        match self.root.field("responseHeader") {
            Some(SolrValue::Map(map)) => Some(map),
            _ => None,
        }
    }

    /// Every top-level value of the envelope, for callers that need more
    /// than the result list.
    pub fn root(&self) -> &SolrDoc {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SolrValue> {
        self.results().get(index)
    }
}
