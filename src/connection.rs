//! HTTP connection to the indexing service.
//!
//! [`SolrConnection`] implements the [`IndexSink`] and [`Reconnect`] seams
//! the pipeline drives: submissions and commits POST update commands to
//! `{base}/update`, and the schema is fetched once and cached for the
//! connection's lifetime. The underlying transport is built lazily, so
//! `reset` is safe to call whether or not a request is outstanding.

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::sync::Arc;
use std::time::Duration;

use crate::models::ContentItem;
use crate::schema::SolrSchema;

/// Submission failure, split by recovery policy.
#[derive(Debug)]
pub enum SubmitError {
    /// A malformed or truncated response during a single submission. The
    /// pipeline recovers locally: warn, reset the connection, move on.
    Transient(String),
    /// Everything else. Propagates and aborts the run.
    Fatal(anyhow::Error),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Transient(e) => write!(f, "transient transport failure: {}", e),
            SubmitError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Transient(_) => None,
            SubmitError::Fatal(e) => Some(e.as_ref()),
        }
    }
}

/// Where the pipeline sends indexable items.
pub trait IndexSink {
    fn submit(&mut self, path: &str, item: &ContentItem) -> Result<(), SubmitError>;
    fn commit(&mut self) -> Result<(), SubmitError>;
}

/// Recovery primitive: release the underlying transport so the next use
/// re-establishes it. Must be safe to call at any time.
pub trait Reconnect {
    fn reset(&mut self);
}

/// A blocking connection to one Solr core.
pub struct SolrConnection {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::blocking::Client>,
    schema: Option<Arc<SolrSchema>>,
}

impl SolrConnection {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
            client: None,
            schema: None,
        }
    }

    /// Drop the transport; with `clear_schema` also invalidate the cached
    /// schema so the next [`SolrConnection::schema`] call refetches it.
    pub fn reset(&mut self, clear_schema: bool) {
        self.client = None;
        if clear_schema {
            self.schema = None;
        }
    }

    /// The remote schema, fetched once and shared for the connection's
    /// lifetime. Concurrent readers hold `Arc` clones; a refetch installs a
    /// brand-new instance and never mutates a published one.
    pub fn schema(&mut self) -> anyhow::Result<Arc<SolrSchema>> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }
        let url = format!("{}/admin/file/?file=schema.xml", self.base_url);
        let client = self.ensure_client()?;
        let body = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching {}", url))?
            .text()
            .context("reading schema.xml")?;
        let schema = Arc::new(
            SolrSchema::parse(body.as_bytes()).context("parsing schema.xml")?,
        );
        self.schema = Some(schema.clone());
        Ok(schema)
    }

    /// Delete every document matching `query`, e.g. `id:[* TO *]`.
    pub fn delete_by_query(&mut self, query: &str) -> Result<(), SubmitError> {
        let body = encode_delete_query(query).map_err(SubmitError::Fatal)?;
        self.post_update(body)
    }

    fn ensure_client(&mut self) -> anyhow::Result<&reqwest::blocking::Client> {
        match &mut self.client {
            Some(client) => Ok(client),
            slot => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .context("building http client")?;
                Ok(slot.insert(client))
            }
        }
    }

    fn post_update(&mut self, body: String) -> Result<(), SubmitError> {
        let url = format!("{}/update", self.base_url);
        let client = self.ensure_client().map_err(SubmitError::Fatal)?;
        let response = client
            .post(&url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(body)
            .send()
            .map_err(classify_transport_error)?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| SubmitError::Transient(format!("truncated response body: {}", e)))?;
        if !status.is_success() {
            return Err(SubmitError::Fatal(anyhow!(
                "update request returned {}: {}",
                status,
                text.trim()
            )));
        }
        Ok(())
    }
}

/// The transient set is narrow: a garbled or truncated response while a
/// request is in flight recovers, timeouts and refused connections are fatal.
fn classify_transport_error(e: reqwest::Error) -> SubmitError {
    if e.is_timeout() || e.is_connect() {
        SubmitError::Fatal(e.into())
    } else if e.is_body() || e.is_decode() || e.is_request() {
        // a malformed status line surfaces as a request-phase error, not as
        // a body or decode failure
        SubmitError::Transient(e.to_string())
    } else {
        SubmitError::Fatal(e.into())
    }
}

impl IndexSink for SolrConnection {
    fn submit(&mut self, _path: &str, item: &ContentItem) -> Result<(), SubmitError> {
        let schema = self.schema.clone();
        let body = encode_add(item, schema.as_deref()).map_err(SubmitError::Fatal)?;
        self.post_update(body)
    }

    fn commit(&mut self) -> Result<(), SubmitError> {
        self.post_update(encode_commit().to_string())
    }
}

impl Reconnect for SolrConnection {
    fn reset(&mut self) {
        SolrConnection::reset(self, false);
    }
}

/// Encode one item as an `<add>` update command. Fields the schema does not
/// declare are dropped when a schema is given; field order is sorted so the
/// encoding is deterministic.
pub fn encode_add(item: &ContentItem, schema: Option<&SolrSchema>) -> anyhow::Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new("add")))?;
    writer.write_event(Event::Start(BytesStart::new("doc")))?;
    let mut names: Vec<&String> = item.fields.keys().collect();
    names.sort();
    for name in names {
        if let Some(schema) = schema {
            if schema.field(name).is_none() {
                continue;
            }
        }
        let mut field = BytesStart::new("field");
        field.push_attribute(("name", name.as_str()));
        writer.write_event(Event::Start(field))?;
        writer.write_event(Event::Text(BytesText::new(&item.fields[name])))?;
        writer.write_event(Event::End(BytesEnd::new("field")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("doc")))?;
    writer.write_event(Event::End(BytesEnd::new("add")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

pub fn encode_commit() -> &'static str {
    "<commit/>"
}

pub fn encode_delete_query(query: &str) -> anyhow::Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new("delete")))?;
    writer.write_event(Event::Start(BytesStart::new("query")))?;
    writer.write_event(Event::Text(BytesText::new(query)))?;
    writer.write_event(Event::End(BytesEnd::new("query")))?;
    writer.write_event(Event::End(BytesEnd::new("delete")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}
