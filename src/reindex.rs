//! Batch reindexing pipeline.
//!
//! Walks a content source depth-first, submits every indexable item to the
//! sink, and checkpoints durability with an intermediate commit after each
//! `batch` successfully indexed items. A transient transport failure on one
//! item is recovered locally (warn, reset the connection, move on — the item
//! is not retried and not counted); any other error aborts the run. One
//! final commit is always issued after traversal, so a run ending mid-batch
//! never leaves uncommitted work.

use anyhow::{anyhow, bail, Context, Result};
use cpu_time::ProcessTime;
use std::time::{Duration, Instant};

use crate::connection::{IndexSink, Reconnect, SolrConnection, SubmitError};
use crate::models::ContentItem;
use crate::progress::{ReindexEvent, ReindexProgress};

/// A tree of indexable items.
///
/// The enumeration must be deterministic, depth-first in the source's
/// natural order, and cover every node exactly once; skip-and-resume
/// semantics depend on it.
pub trait ContentSource {
    fn walk(&self) -> Box<dyn Iterator<Item = (String, ContentItem)> + '_>;
}

/// What happened to one visited item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Indexed,
    SkippedNotIndexable,
    RecoveredTransientFailure,
}

/// Aggregate counts and timing for one run.
#[derive(Debug, Clone)]
pub struct ReindexSummary {
    pub scanned: u64,
    pub indexed: u64,
    pub elapsed_wall: Duration,
    pub elapsed_cpu: Duration,
}

/// Reindex every indexable item under `source`.
///
/// The first `skip` visited items are counted but never submitted, so an
/// interrupted run can resume where it left off. Returns the run summary;
/// on a fatal error, work committed at the last batch boundary is durable
/// and the error propagates instead of a summary.
pub fn run_reindex<S>(
    source: &dyn ContentSource,
    indexable: &dyn Fn(&ContentItem) -> bool,
    sink: &mut S,
    progress: &dyn ReindexProgress,
    batch: usize,
    skip: u64,
) -> Result<ReindexSummary>
where
    S: IndexSink + Reconnect + ?Sized,
{
    if batch == 0 {
        bail!("batch size must be greater than zero");
    }
    if skip > 0 {
        progress.report(ReindexEvent::Skipping { count: skip });
    }
    let wall = Instant::now();
    let cpu = ProcessTime::try_now().context("reading process cpu clock")?;
    let mut scanned = 0u64;
    let mut indexed = 0u64;
    let mut until_commit = batch;
    for (path, item) in source.walk() {
        scanned += 1;
        if scanned <= skip {
            continue;
        }
        match submit_one(sink, progress, indexable, &path, &item)? {
            ItemOutcome::Indexed => {
                indexed += 1;
                until_commit -= 1;
                if until_commit == 0 {
                    progress.report(ReindexEvent::IntermediateCommit { indexed });
                    sink.commit().map_err(as_fatal)?;
                    until_commit = batch;
                    sink.reset();
                }
            }
            ItemOutcome::SkippedNotIndexable | ItemOutcome::RecoveredTransientFailure => {}
        }
    }
    // make sure to commit in the end, even if the last batch was empty
    sink.commit().map_err(as_fatal)?;
    let summary = ReindexSummary {
        scanned,
        indexed,
        elapsed_wall: wall.elapsed(),
        elapsed_cpu: cpu.try_elapsed().context("reading process cpu clock")?,
    };
    progress.report(ReindexEvent::Finished {
        indexed: summary.indexed,
        elapsed_wall: summary.elapsed_wall,
        elapsed_cpu: summary.elapsed_cpu,
    });
    Ok(summary)
}

fn submit_one<S>(
    sink: &mut S,
    progress: &dyn ReindexProgress,
    indexable: &dyn Fn(&ContentItem) -> bool,
    path: &str,
    item: &ContentItem,
) -> Result<ItemOutcome>
where
    S: IndexSink + Reconnect + ?Sized,
{
    if !indexable(item) {
        return Ok(ItemOutcome::SkippedNotIndexable);
    }
    let lap = Instant::now();
    match sink.submit(path, item) {
        Ok(()) => {
            progress.report(ReindexEvent::Indexed {
                path: path.to_string(),
                elapsed: lap.elapsed(),
            });
            Ok(ItemOutcome::Indexed)
        }
        Err(SubmitError::Transient(reason)) => {
            progress.report(ReindexEvent::TransientFailure {
                path: path.to_string(),
                reason,
            });
            sink.reset(); // force a fresh connection before the next item
            Ok(ItemOutcome::RecoveredTransientFailure)
        }
        Err(SubmitError::Fatal(e)) => Err(e.context(format!("indexing {}", path))),
    }
}

fn as_fatal(err: SubmitError) -> anyhow::Error {
    match err {
        SubmitError::Transient(reason) => anyhow!("commit failed: {}", reason),
        SubmitError::Fatal(e) => e.context("commit failed"),
    }
}

/// Delete every indexed document and commit, leaving the index empty.
pub fn run_clear(conn: &mut SolrConnection) -> Result<()> {
    let schema = conn.schema().context("fetching schema")?;
    let unique_key = schema
        .unique_key()
        .ok_or_else(|| anyhow!("schema declares no uniqueKey"))?;
    conn.delete_by_query(&format!("{}:[* TO *]", unique_key))
        .map_err(|e| anyhow!("clearing index: {}", e))?;
    conn.commit().map_err(as_fatal)?;
    Ok(())
}
