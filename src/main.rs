//! # Solr Harness CLI (`solr-harness`)
//!
//! Operational commands against a configured Solr core:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `solr-harness reindex` | Walk the content source and (re)index every item |
//! | `solr-harness clear` | Delete all indexed documents and commit |
//! | `solr-harness schema` | Fetch and display the remote schema |
//!
//! ```bash
//! # full reindex, committing every 100 items
//! solr-harness reindex --config ./solr-harness.toml
//!
//! # resume an interrupted run, skipping the first 5000 items
//! solr-harness reindex --skip 5000 --config ./solr-harness.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use solr_harness::config::load_config;
use solr_harness::connection::SolrConnection;
use solr_harness::models::ContentItem;
use solr_harness::progress::ProgressMode;
use solr_harness::reindex::{run_clear, run_reindex};
use solr_harness::source_fs::FilesystemSource;

/// Solr harness — batch indexing and maintenance for a Solr core.
#[derive(Parser)]
#[command(
    name = "solr-harness",
    about = "Batch indexing and maintenance for an Apache Solr core",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./solr-harness.toml")]
    config: PathBuf,

    /// Progress output on stderr: off, human, or json.
    /// Defaults to human when stderr is a TTY.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the content source and (re)index every item.
    Reindex {
        /// Items per intermediate commit (defaults to reindex.batch_size).
        #[arg(long)]
        batch: Option<usize>,

        /// Number of leading items to scan without submitting, to resume an
        /// interrupted run.
        #[arg(long, default_value_t = 0)]
        skip: u64,
    },

    /// Delete every indexed document and commit.
    Clear,

    /// Fetch and display the remote schema.
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let mode = progress_mode(cli.progress.as_deref())?;
    let mut conn = SolrConnection::new(&config.solr.base_url, config.solr.timeout_secs);

    match cli.command {
        Commands::Reindex { batch, skip } => {
            let source_config = config
                .source
                .as_ref()
                .context("no [source] section in configuration")?;
            let source = FilesystemSource::new(source_config)?;
            // warm the schema cache so submissions filter fields through it
            conn.schema().context("fetching schema from solr")?;
            let reporter = mode.reporter();
            let batch = batch.unwrap_or(config.reindex.batch_size);
            let summary = run_reindex(
                &source,
                &indexable,
                &mut conn,
                reporter.as_ref(),
                batch,
                skip,
            )?;
            println!(
                "indexed {} of {} object(s) in {:.3}s ({:.3}s cpu)",
                summary.indexed,
                summary.scanned,
                summary.elapsed_wall.as_secs_f64(),
                summary.elapsed_cpu.as_secs_f64()
            );
        }
        Commands::Clear => {
            run_clear(&mut conn)?;
            println!("solr index cleared.");
        }
        Commands::Schema => {
            let schema = conn.schema()?;
            if let Some(key) = schema.unique_key() {
                println!("uniqueKey: {}", key);
            }
            if let Some(field) = schema.default_search_field() {
                println!("defaultSearchField: {}", field);
            }
            for field in schema.fields() {
                let mut flags = Vec::new();
                if field.indexed {
                    flags.push("indexed");
                }
                if field.stored {
                    flags.push("stored");
                }
                if field.required {
                    flags.push("required");
                }
                if field.multi_valued {
                    flags.push("multiValued");
                }
                println!("{}  type={}  {}", field.name, field.field_type, flags.join(","));
            }
        }
    }
    Ok(())
}

/// Capability check for the filesystem source: only textual content is
/// submitted.
fn indexable(item: &ContentItem) -> bool {
    item.content_type.starts_with("text/")
}

fn progress_mode(flag: Option<&str>) -> Result<ProgressMode> {
    match flag {
        None => Ok(ProgressMode::default_for_tty()),
        Some("off") => Ok(ProgressMode::Off),
        Some("human") => Ok(ProgressMode::Human),
        Some("json") => Ok(ProgressMode::Json),
        Some(other) => bail!(
            "unknown progress mode: '{}'. Must be off, human, or json.",
            other
        ),
    }
}
