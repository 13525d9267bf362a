//! # Solr Harness
//!
//! Integration between a content repository and an Apache-Solr-style remote
//! indexing service: a streaming XML deserializer that builds typed response
//! and schema models in a single pass, and a batch reindexing pipeline with
//! commit checkpoints and transient-failure recovery.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │   Content    │──▶│   Reindex    │──▶│ SolrConnection  │──▶ POST /update
//! │   source     │   │   pipeline   │   │ (sink + schema) │
//! └─────────────┘   └──────────────┘   └────────┬────────┘
//!                                               │
//!                    ┌──────────────┐           ▼
//!                    │   Streaming  │◀── schema.xml / select responses
//!                    │    parser    │
//!                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Typed value tree and indexable content items |
//! | [`parser`] | Single-pass streaming XML deserializer |
//! | [`response`] | Search-response model |
//! | [`schema`] | Schema (field-type catalog) model |
//! | [`connection`] | Blocking HTTP sink with schema cache |
//! | [`reindex`] | Batch reindexing pipeline |
//! | [`progress`] | Progress reporting on stderr |
//! | [`source_fs`] | Filesystem content source |
//! | [`config`] | TOML configuration parsing |

pub mod config;
pub mod connection;
pub mod models;
pub mod parser;
pub mod progress;
pub mod reindex;
pub mod response;
pub mod schema;
pub mod source_fs;
