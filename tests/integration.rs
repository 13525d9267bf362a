//! Integration tests for the parsing models and the reindexing pipeline.
//!
//! Parsing is exercised through realistic response and schema documents;
//! the pipeline runs against an in-memory content source and a fake sink
//! that records submissions, commits, and connection resets.

use anyhow::Result;
use chrono::Datelike;
use solr_harness::config::{load_config, SourceConfig};
use solr_harness::connection::{
    encode_add, encode_commit, encode_delete_query, IndexSink, Reconnect, SolrConnection,
    SubmitError,
};
use solr_harness::models::{ContentItem, SolrValue};
use solr_harness::parser::ParseError;
use solr_harness::progress::NoProgress;
use solr_harness::reindex::{run_reindex, ContentSource};
use solr_harness::response::{SolrResponse, LEAVES};
use solr_harness::schema::{AttrValue, SchemaError, SolrSchema};
use solr_harness::source_fs::FilesystemSource;
use std::collections::HashMap;
use tempfile::TempDir;

// ─── Test collaborators ─────────────────────────────────────────────

struct VecSource {
    items: Vec<(String, ContentItem)>,
}

impl VecSource {
    fn with_items(count: usize) -> Self {
        Self {
            items: (1..=count).map(|n| test_item(&format!("item-{}", n))).collect(),
        }
    }
}

impl ContentSource for VecSource {
    fn walk(&self) -> Box<dyn Iterator<Item = (String, ContentItem)> + '_> {
        Box::new(self.items.iter().cloned())
    }
}

/// Records every interaction; fails the n-th submission attempt on demand.
#[derive(Default)]
struct FakeSink {
    attempts: usize,
    submitted: Vec<String>,
    commits: Vec<usize>, // number of submitted items at each commit
    resets: usize,
    transient_at: Vec<usize>,
    fatal_at: Option<usize>,
}

impl IndexSink for FakeSink {
    fn submit(&mut self, path: &str, _item: &ContentItem) -> Result<(), SubmitError> {
        self.attempts += 1;
        if self.transient_at.contains(&self.attempts) {
            return Err(SubmitError::Transient("bad status line".to_string()));
        }
        if self.fatal_at == Some(self.attempts) {
            return Err(SubmitError::Fatal(anyhow::anyhow!("service unavailable")));
        }
        self.submitted.push(path.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SubmitError> {
        self.commits.push(self.submitted.len());
        Ok(())
    }
}

impl Reconnect for FakeSink {
    fn reset(&mut self) {
        self.resets += 1;
    }
}

fn test_item(id: &str) -> (String, ContentItem) {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), id.to_string());
    fields.insert("SearchableText".to_string(), format!("body of {}", id));
    (
        id.to_string(),
        ContentItem {
            id: id.to_string(),
            title: Some(id.to_string()),
            content_type: "text/plain".to_string(),
            modified: chrono::Utc::now(),
            fields,
        },
    )
}

// ─── Scalar decoding ────────────────────────────────────────────────

#[test]
fn scalar_leaves_decode_to_native_values() {
    let xml = r#"<response>
        <lst name="values">
            <int name="i">42</int>
            <long name="l">9876543210</long>
            <float name="f">1.5</float>
            <double name="d">-2.25</double>
            <bool name="yes">true</bool>
            <bool name="no">false</bool>
            <str name="s">hello</str>
            <str name="empty"></str>
            <str name="selfclosed"/>
            <null name="n"/>
            <date name="when">2021-06-05T12:30:00Z</date>
        </lst>
    </response>"#;
    let response = SolrResponse::parse(xml.as_bytes()).unwrap();
    let Some(SolrValue::Map(values)) = response.root().field("values") else {
        panic!("expected a map under 'values'");
    };
    assert_eq!(values["i"].as_i64(), Some(42));
    assert_eq!(values["l"].as_i64(), Some(9_876_543_210));
    assert_eq!(values["f"].as_f64(), Some(1.5));
    assert_eq!(values["d"].as_f64(), Some(-2.25));
    assert_eq!(values["yes"].as_bool(), Some(true));
    assert_eq!(values["no"].as_bool(), Some(false));
    assert_eq!(values["s"].as_str(), Some("hello"));
    // absent text decodes to the empty string, never to null
    assert_eq!(values["empty"].as_str(), Some(""));
    assert_eq!(values["selfclosed"].as_str(), Some(""));
    assert!(values["n"].is_null());
    assert_eq!(values["when"].as_date().unwrap().year(), 2021);
}

#[test]
fn date_decoder_repads_stripped_year() {
    let decode = LEAVES.get("date").unwrap();
    let value = decode(Some("5-06-21T00:00:00Z")).unwrap();
    assert_eq!(value.as_date().unwrap().year(), 5);
    let value = decode(Some("2021-06-05T00:00:00Z")).unwrap();
    assert_eq!(value.as_date().unwrap().year(), 2021);
}

// ─── Nesting ────────────────────────────────────────────────────────

#[test]
fn nested_containers_preserve_names_and_order() {
    let xml = r#"<response>
        <lst name="outer">
            <int name="count">3</int>
            <arr name="tags"><str>foo</str><str>bar</str></arr>
        </lst>
    </response>"#;
    let response = SolrResponse::parse(xml.as_bytes()).unwrap();
    let Some(SolrValue::Map(outer)) = response.root().field("outer") else {
        panic!("expected a map under 'outer'");
    };
    assert_eq!(outer["count"].as_i64(), Some(3));
    let Some(SolrValue::List(tags)) = outer.get("tags") else {
        panic!("expected a list under 'tags'");
    };
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].as_str(), Some("foo"));
    assert_eq!(tags[1].as_str(), Some("bar"));
}

#[test]
fn unknown_tags_are_skipped() {
    let xml = r#"<response>
        <wrapper><lst name="inner"><int name="i">1</int></lst></wrapper>
    </response>"#;
    let response = SolrResponse::parse(xml.as_bytes()).unwrap();
    let Some(SolrValue::Map(inner)) = response.root().field("inner") else {
        panic!("expected a map under 'inner'");
    };
    assert_eq!(inner["i"].as_i64(), Some(1));
}

#[test]
fn mismatched_tags_are_a_syntax_error() {
    let err = SolrResponse::parse(r#"<response><lst name="a"></response>"#.as_bytes()).unwrap_err();
    assert!(matches!(err, ParseError::Syntax(_)));
}

#[test]
fn truncated_document_is_a_syntax_error() {
    let err = SolrResponse::parse(r#"<response><lst name="a">"#.as_bytes()).unwrap_err();
    assert!(matches!(err, ParseError::Syntax(_)));
}

#[test]
fn extra_attributes_on_plain_containers_violate_invariants() {
    let xml = r#"<response><lst name="a" junk="x"><int name="i">1</int></lst></response>"#;
    let err = SolrResponse::parse(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, ParseError::Invariant(_)));
}

#[test]
fn unnamed_child_of_a_map_violates_invariants() {
    let xml = r#"<response><lst name="a"><int>1</int></lst></response>"#;
    let err = SolrResponse::parse(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, ParseError::Invariant(_)));
}

// ─── Response model ─────────────────────────────────────────────────

#[test]
fn realistic_select_response_parses() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
    <response>
        <lst name="responseHeader">
            <int name="status">0</int>
            <int name="QTime">1</int>
            <lst name="params"><str name="q">Title:document</str></lst>
        </lst>
        <result name="response" numFound="2" start="0">
            <doc>
                <str name="id">500</str>
                <str name="Title">first document</str>
                <arr name="subject"><str>foo</str><str>bar</str></arr>
                <float name="score">0.5</float>
                <bool name="allowed">true</bool>
                <date name="modified">2007-08-11T01:00:00Z</date>
            </doc>
            <doc>
                <str name="id">501</str>
                <str name="Title">second document</str>
            </doc>
        </result>
    </response>"#;
    let response = SolrResponse::parse(xml.as_bytes()).unwrap();

    assert_eq!(response.len(), 2);
    assert_eq!(response.results().num_found(), Some(2));
    assert_eq!(response.results().start(), Some(0));

    let header = response.header().unwrap();
    assert_eq!(header["status"].as_i64(), Some(0));

    let Some(SolrValue::Doc(doc)) = response.get(0) else {
        panic!("expected a document at index 0");
    };
    assert!(doc.open_access);
    assert_eq!(doc.field("id").and_then(SolrValue::as_str), Some("500"));
    assert_eq!(doc.field("score").and_then(SolrValue::as_f64), Some(0.5));
    assert_eq!(doc.field("allowed").and_then(SolrValue::as_bool), Some(true));
    assert_eq!(
        doc.field("modified").and_then(SolrValue::as_date).map(|d| d.year()),
        Some(2007)
    );
    let Some(SolrValue::Doc(doc)) = response.get(1) else {
        panic!("expected a document at index 1");
    };
    assert_eq!(doc.field("Title").and_then(SolrValue::as_str), Some("second document"));
}

#[test]
fn response_without_result_set_is_empty_not_an_error() {
    let xml = r#"<response>
        <lst name="responseHeader"><int name="status">400</int></lst>
    </response>"#;
    let response = SolrResponse::parse(xml.as_bytes()).unwrap();
    assert!(response.is_empty());
    assert_eq!(response.len(), 0);
    assert!(response.get(0).is_none());
    assert_eq!(response.header().unwrap()["status"].as_i64(), Some(400));
}

// ─── Schema model ───────────────────────────────────────────────────

const SCHEMA_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema name="plone" version="1.2">
    <types>
        <fieldType name="string" class="solr.StrField" sortMissingLast="true" omitNorms="true"/>
        <fieldType name="text" class="solr.TextField" positionIncrementGap="100">
            <analyzer type="index">
                <tokenizer class="solr.WhitespaceTokenizerFactory"/>
                <filter class="solr.LowerCaseFilterFactory"/>
            </analyzer>
        </fieldType>
        <fieldType name="date" class="solr.DateField" sortMissingLast="true" omitNorms="true"/>
    </types>
    <fields>
        <field name="id" type="string" indexed="true" stored="true" required="true"/>
        <field name="Title" type="text" indexed="true" stored="true"/>
        <field name="SearchableText" type="text" indexed="true" stored="false"/>
        <field name="modified" type="date" indexed="true" stored="true"/>
    </fields>
    <uniqueKey>id</uniqueKey>
    <defaultSearchField>SearchableText</defaultSearchField>
    <solrQueryParser defaultOperator="AND"/>
</schema>"#;

#[test]
fn realistic_schema_parses() {
    let schema = SolrSchema::parse(SCHEMA_XML.as_bytes()).unwrap();

    assert_eq!(schema.unique_key(), Some("id"));
    assert_eq!(schema.default_search_field(), Some("SearchableText"));
    assert_eq!(schema.required_fields(), ["id".to_string()]);
    assert_eq!(
        schema.query_parser().unwrap().attrs.get("defaultOperator"),
        Some(&"AND".to_string())
    );

    let names: Vec<&str> = schema.fields().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["id", "Title", "SearchableText", "modified"]);

    let stored: Vec<&str> = schema.stored().collect();
    assert_eq!(stored, ["id", "Title", "modified"]);

    let title = schema.field("Title").unwrap();
    assert_eq!(title.field_type, "text");
    assert_eq!(title.class_.as_deref(), Some("solr.TextField"));
    assert!(title.indexed && title.stored);
    assert!(!title.required && !title.multi_valued);
    // type-level attribute inherited through the merge
    assert_eq!(
        title.attr("positionIncrementGap"),
        Some(&AttrValue::Str("100".to_string()))
    );
    assert_eq!(
        schema.field("id").unwrap().attr("omitNorms"),
        Some(&AttrValue::Bool(true))
    );
}

#[test]
fn field_level_attributes_override_type_level() {
    let xml = r#"<schema name="test" version="1.1">
        <fieldType name="keyword" class="solr.StrField" stored="true" indexed="true"/>
        <field name="tag" type="keyword" stored="false"/>
    </schema>"#;
    let schema = SolrSchema::parse(xml.as_bytes()).unwrap();
    let tag = schema.field("tag").unwrap();
    assert!(!tag.stored);
    assert!(tag.indexed);
    assert_eq!(tag.class_.as_deref(), Some("solr.StrField"));
}

#[test]
fn field_referencing_undeclared_type_fails() {
    let xml = r#"<schema name="test" version="1.1">
        <field name="x" type="missing"/>
    </schema>"#;
    let err = SolrSchema::parse(xml.as_bytes()).unwrap_err();
    match err {
        SchemaError::UnknownFieldType { field, field_type } => {
            assert_eq!(field, "x");
            assert_eq!(field_type, "missing");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn field_declared_before_its_type_fails() {
    let xml = r#"<schema name="test" version="1.1">
        <field name="x" type="later"/>
        <fieldType name="later" class="solr.StrField"/>
    </schema>"#;
    let err = SolrSchema::parse(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, SchemaError::UnknownFieldType { .. }));
}

#[test]
fn field_without_name_fails() {
    let xml = r#"<schema name="test" version="1.1">
        <fieldType class="solr.StrField"/>
    </schema>"#;
    let err = SolrSchema::parse(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, SchemaError::MissingName { .. }));
}

// ─── Pipeline: skip, batch, and commit semantics ────────────────────

#[test]
fn skip_and_batch_commit_cadence() {
    let source = VecSource::with_items(10);
    let mut sink = FakeSink::default();
    let all = |_: &ContentItem| true;

    let summary = run_reindex(&source, &all, &mut sink, &NoProgress, 3, 4).unwrap();

    assert_eq!(summary.scanned, 10);
    assert_eq!(summary.indexed, 6);
    // intermediate commits after the 3rd and 6th indexed item, then the
    // unconditional final commit
    assert_eq!(sink.commits, [3, 6, 6]);
    // connection re-established at each batch boundary
    assert_eq!(sink.resets, 2);
    assert_eq!(
        sink.submitted,
        ["item-5", "item-6", "item-7", "item-8", "item-9", "item-10"]
    );
}

#[test]
fn final_commit_issued_even_when_nothing_indexed() {
    let source = VecSource::with_items(0);
    let mut sink = FakeSink::default();
    let all = |_: &ContentItem| true;

    let summary = run_reindex(&source, &all, &mut sink, &NoProgress, 10, 0).unwrap();

    assert_eq!(summary.scanned, 0);
    assert_eq!(summary.indexed, 0);
    assert_eq!(sink.commits, [0]);
}

#[test]
fn non_indexable_items_are_scanned_but_not_submitted() {
    let mut source = VecSource::with_items(3);
    source.items[1].1.content_type = "application/octet-stream".to_string();
    let mut sink = FakeSink::default();
    let textual = |item: &ContentItem| item.content_type.starts_with("text/");

    let summary = run_reindex(&source, &textual, &mut sink, &NoProgress, 10, 0).unwrap();

    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.indexed, 2);
    assert_eq!(sink.submitted, ["item-1", "item-3"]);
}

#[test]
fn zero_batch_size_is_rejected() {
    let source = VecSource::with_items(1);
    let mut sink = FakeSink::default();
    let all = |_: &ContentItem| true;

    let err = run_reindex(&source, &all, &mut sink, &NoProgress, 0, 0).unwrap_err();
    assert!(err.to_string().contains("batch size"));
    assert!(sink.commits.is_empty());
}

// ─── Pipeline: failure recovery ─────────────────────────────────────

#[test]
fn transient_failure_is_recovered_and_not_counted() {
    let source = VecSource::with_items(10);
    let mut sink = FakeSink {
        transient_at: vec![5],
        ..FakeSink::default()
    };
    let all = |_: &ContentItem| true;

    let summary = run_reindex(&source, &all, &mut sink, &NoProgress, 100, 0).unwrap();

    assert_eq!(summary.scanned, 10);
    assert_eq!(summary.indexed, 9);
    assert!(!sink.submitted.contains(&"item-5".to_string()));
    // exactly one reset for the failure; batch never filled, so no
    // boundary resets
    assert_eq!(sink.resets, 1);
    assert_eq!(sink.commits, [9]);
}

#[test]
fn transient_failure_does_not_shift_the_commit_boundary() {
    let source = VecSource::with_items(7);
    let mut sink = FakeSink {
        transient_at: vec![2],
        ..FakeSink::default()
    };
    let all = |_: &ContentItem| true;

    let summary = run_reindex(&source, &all, &mut sink, &NoProgress, 3, 0).unwrap();

    // items 1,3,4 fill the first batch; 5,6,7 the second
    assert_eq!(summary.indexed, 6);
    assert_eq!(sink.commits, [3, 6, 6]);
    assert_eq!(sink.resets, 3); // one for the failure, two at boundaries
}

#[test]
fn fatal_error_aborts_without_final_commit() {
    let source = VecSource::with_items(10);
    let mut sink = FakeSink {
        transient_at: vec![5],
        fatal_at: Some(8),
        ..FakeSink::default()
    };
    let all = |_: &ContentItem| true;

    let err = run_reindex(&source, &all, &mut sink, &NoProgress, 100, 0).unwrap_err();

    assert!(err.to_string().contains("indexing item-8"));
    assert!(sink.commits.is_empty());
    assert_eq!(sink.resets, 1); // only the transient recovery
    assert_eq!(sink.submitted.len(), 6);
}

// ─── Transport error classification ─────────────────────────────────

#[test]
fn garbled_status_line_is_transient() {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        // drain the request head, then answer with garbage and hang up
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(b"bogus\r\n\r\n");
    });

    let mut conn = SolrConnection::new(&format!("http://{}/solr", addr), 5);
    let err = conn.commit().unwrap_err();
    assert!(
        matches!(err, SubmitError::Transient(_)),
        "expected a transient failure, got: {}",
        err
    );
    server.join().unwrap();
}

#[test]
fn connection_refused_is_fatal() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // nothing listens on the port anymore

    let mut conn = SolrConnection::new(&format!("http://{}/solr", addr), 5);
    let err = conn.commit().unwrap_err();
    assert!(matches!(err, SubmitError::Fatal(_)));
}

// ─── Update command encoding ────────────────────────────────────────

#[test]
fn add_command_encodes_sorted_and_escaped() {
    let (_, mut item) = test_item("a&b");
    item.fields.insert("Title".to_string(), "x < y".to_string());
    let xml = encode_add(&item, None).unwrap();
    assert_eq!(
        xml,
        "<add><doc>\
         <field name=\"SearchableText\">body of a&amp;b</field>\
         <field name=\"Title\">x &lt; y</field>\
         <field name=\"id\">a&amp;b</field>\
         </doc></add>"
    );
}

#[test]
fn add_command_drops_fields_missing_from_schema() {
    let xml = r#"<schema name="test" version="1.1">
        <fieldType name="string" class="solr.StrField"/>
        <field name="id" type="string"/>
    </schema>"#;
    let schema = SolrSchema::parse(xml.as_bytes()).unwrap();
    let (_, item) = test_item("42");
    let encoded = encode_add(&item, Some(&schema)).unwrap();
    assert_eq!(encoded, "<add><doc><field name=\"id\">42</field></doc></add>");
}

#[test]
fn commit_and_delete_commands_encode() {
    assert_eq!(encode_commit(), "<commit/>");
    assert_eq!(
        encode_delete_query("id:[* TO *]").unwrap(),
        "<delete><query>id:[* TO *]</query></delete>"
    );
}

// ─── Config ─────────────────────────────────────────────────────────

#[test]
fn config_defaults_apply_when_keys_are_omitted() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("solr-harness.toml");
    std::fs::write(
        &path,
        r#"
[solr]
base_url = "http://localhost:8983/solr"

[source]
root = "./docs"
"#,
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.solr.timeout_secs, 30);
    assert_eq!(config.reindex.batch_size, 100);
    let source = config.source.unwrap();
    assert_eq!(source.include_globs, ["**/*.md", "**/*.txt"]);
    assert!(source.exclude_globs.is_empty());
    assert!(!source.follow_symlinks);
}

#[test]
fn zero_batch_size_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("solr-harness.toml");
    std::fs::write(
        &path,
        r#"
[solr]
base_url = "http://localhost:8983/solr"

[reindex]
batch_size = 0
"#,
    )
    .unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("batch_size"));
}

// ─── Filesystem source ──────────────────────────────────────────────

#[test]
fn filesystem_walk_is_sorted_depth_first_and_honors_globs() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("b.txt"), "bravo").unwrap();
    std::fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(tmp.path().join("skip.rs"), "fn main() {}").unwrap();
    std::fs::create_dir(tmp.path().join("sub")).unwrap();
    std::fs::write(tmp.path().join("sub").join("c.txt"), "charlie").unwrap();
    std::fs::create_dir(tmp.path().join("vendor")).unwrap();
    std::fs::write(tmp.path().join("vendor").join("d.txt"), "delta").unwrap();
    std::fs::create_dir(tmp.path().join(".git")).unwrap();
    std::fs::write(tmp.path().join(".git").join("notes.txt"), "noise").unwrap();

    let config = SourceConfig {
        root: tmp.path().to_path_buf(),
        include_globs: vec!["**/*.txt".to_string()],
        exclude_globs: vec!["vendor/**".to_string()],
        follow_symlinks: false,
    };
    let source = FilesystemSource::new(&config).unwrap();

    let walked: Vec<(String, ContentItem)> = source.walk().collect();
    let paths: Vec<&str> = walked.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, ["a.txt", "b.txt", "sub/c.txt"]);

    // two walks enumerate identically
    let again: Vec<String> = source.walk().map(|(p, _)| p).collect();
    assert_eq!(again, paths);

    let (_, item) = &walked[0];
    assert_eq!(item.id, "a.txt");
    assert_eq!(item.content_type, "text/plain");
    assert_eq!(item.fields.get("SearchableText").map(String::as_str), Some("alpha"));
    assert_eq!(item.fields.get("Title").map(String::as_str), Some("a.txt"));
}
