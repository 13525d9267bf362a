//! Schema model: a field-type catalog parsed from `schema.xml`.
//!
//! Schema parsing is a shallow single-level reducer over sibling elements,
//! not a deep tree build: `fieldType` declarations are collected first, then
//! each `field` resolves by merging its declared type's attributes with its
//! own. Analyzer, tokenizer, and dynamic-field information is ignored; the
//! collected fields drive both indexing (which attributes to submit) and
//! query construction.

use std::collections::HashMap;
use std::io::BufRead;

use crate::parser::{ElementEvent, ElementReader, ParseError};

/// Schema parse failure.
#[derive(Debug)]
pub enum SchemaError {
    /// Malformed XML underneath.
    Xml(ParseError),
    /// A `field` or `fieldType` element without a `name` attribute.
    MissingName { tag: String },
    /// A `field` element without a `type` attribute.
    MissingType { field: String },
    /// A field referencing a type not declared earlier in the document.
    UnknownFieldType { field: String, field_type: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Xml(e) => write!(f, "schema: {}", e),
            SchemaError::MissingName { tag } => {
                write!(f, "schema: <{}> element without a name attribute", tag)
            }
            SchemaError::MissingType { field } => {
                write!(f, "schema: field {:?} declares no type", field)
            }
            SchemaError::UnknownFieldType { field, field_type } => {
                write!(
                    f,
                    "schema: field {:?} references undeclared type {:?}",
                    field, field_type
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchemaError::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for SchemaError {
    fn from(e: ParseError) -> Self {
        SchemaError::Xml(e)
    }
}

/// A merged field attribute: the string literals `"true"` and `"false"`
/// coerce to booleans, everything else stays a string.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
}

impl AttrValue {
    fn from_raw(raw: String) -> Self {
        match raw.as_str() {
            "true" => AttrValue::Bool(true),
            "false" => AttrValue::Bool(false),
            _ => AttrValue::Str(raw),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn is_true(&self) -> bool {
        matches!(self, AttrValue::Bool(true))
    }
}

/// A resolved schema field: its type's attributes overlaid with its own
/// (field-level wins on conflict).
#[derive(Debug, Clone)]
pub struct SolrField {
    pub name: String,
    /// Name of the `fieldType` this field inherits from.
    pub field_type: String,
    pub required: bool,
    pub multi_valued: bool,
    pub stored: bool,
    pub indexed: bool,
    /// The merged `class` attribute, renamed: `.class` collides with a
    /// reserved accessor name downstream.
    pub class_: Option<String>,
    /// All other merged attributes.
    pub attrs: HashMap<String, AttrValue>,
}

impl SolrField {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }
}

/// Text value of the `solrQueryParser` element with its attributes
/// (typically `defaultOperator`).
#[derive(Debug, Clone)]
pub struct QueryParserInfo {
    pub value: String,
    pub attrs: HashMap<String, String>,
}

/// A parsed schema. Read-only after [`SolrSchema::parse`] returns; callers
/// cache instances process-wide and replace them wholesale on refetch.
#[derive(Debug, Clone, Default)]
pub struct SolrSchema {
    fields: Vec<SolrField>,
    required: Vec<String>,
    unique_key: Option<String>,
    default_search_field: Option<String>,
    query_parser: Option<QueryParserInfo>,
}

impl SolrSchema {
    pub fn parse<R: BufRead>(source: R) -> Result<Self, SchemaError> {
        let mut reader = ElementReader::new(source);
        let mut schema = SolrSchema::default();
        let mut types: HashMap<String, HashMap<String, String>> = HashMap::new();
        while let Some(event) = reader.next_event()? {
            let ElementEvent::End { tag, attrs, text } = event else {
                continue;
            };
            match tag.as_str() {
                "fieldType" => {
                    let name = attrs.get("name").cloned().ok_or_else(|| {
                        SchemaError::MissingName {
                            tag: "fieldType".to_string(),
                        }
                    })?;
                    types.insert(name, attrs);
                }
                "field" => {
                    let field = resolve_field(attrs, &types)?;
                    if field.required {
                        schema.required.push(field.name.clone());
                    }
                    match schema.fields.iter_mut().find(|f| f.name == field.name) {
                        Some(existing) => *existing = field,
                        None => schema.fields.push(field),
                    }
                }
                "uniqueKey" => {
                    schema.unique_key = Some(element_text(text));
                }
                "defaultSearchField" => {
                    schema.default_search_field = Some(element_text(text));
                }
                "solrQueryParser" => {
                    schema.query_parser = Some(QueryParserInfo {
                        value: element_text(text),
                        attrs,
                    });
                }
                _ => {} // analyzer, dynamicField, copyField, ...
            }
        }
        Ok(schema)
    }

    /// All fields in first-seen order. Restartable.
    pub fn fields(&self) -> impl Iterator<Item = &SolrField> {
        self.fields.iter()
    }

    /// Names of all stored fields, a.k.a. metadata.
    pub fn stored(&self) -> impl Iterator<Item = &str> {
        self.fields().filter(|f| f.stored).map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&SolrField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    pub fn unique_key(&self) -> Option<&str> {
        self.unique_key.as_deref()
    }

    pub fn default_search_field(&self) -> Option<&str> {
        self.default_search_field.as_deref()
    }

    pub fn query_parser(&self) -> Option<&QueryParserInfo> {
        self.query_parser.as_ref()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn resolve_field(
    mut attrs: HashMap<String, String>,
    types: &HashMap<String, HashMap<String, String>>,
) -> Result<SolrField, SchemaError> {
    let name = attrs.remove("name").ok_or_else(|| SchemaError::MissingName {
        tag: "field".to_string(),
    })?;
    let field_type = attrs.remove("type").ok_or_else(|| SchemaError::MissingType {
        field: name.clone(),
    })?;
    let type_attrs = types
        .get(&field_type)
        .ok_or_else(|| SchemaError::UnknownFieldType {
            field: name.clone(),
            field_type: field_type.clone(),
        })?;

    let mut merged = type_attrs.clone();
    merged.remove("name");
    merged.extend(attrs); // field-level attributes win
    let class_ = merged.remove("class");
    let attrs: HashMap<String, AttrValue> = merged
        .into_iter()
        .map(|(k, v)| (k, AttrValue::from_raw(v)))
        .collect();

    let flag = |key: &str| attrs.get(key).map(AttrValue::is_true).unwrap_or(false);
    Ok(SolrField {
        required: flag("required"),
        multi_valued: flag("multiValued"),
        stored: flag("stored"),
        indexed: flag("indexed"),
        name,
        field_type,
        class_,
        attrs,
    })
}

fn element_text(text: Option<String>) -> String {
    text.map(|t| t.trim().to_string()).unwrap_or_default()
}
