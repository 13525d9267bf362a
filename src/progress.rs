//! Reindex progress reporting.
//!
//! Reports observable moments of a reindex run (per-item timing, transient
//! failures, commit checkpoints, the final summary) so operators can watch a
//! long run. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts. Observability only: the pipeline never depends on it for
//! correctness.

use std::io::Write;
use std::time::Duration;

/// A single progress event from the reindex pipeline.
#[derive(Clone, Debug)]
pub enum ReindexEvent {
    /// The first `count` items will be scanned without submitting.
    Skipping { count: u64 },
    /// One item was submitted successfully.
    Indexed { path: String, elapsed: Duration },
    /// One item failed transiently and was abandoned.
    TransientFailure { path: String, reason: String },
    /// A durability checkpoint after a full batch.
    IntermediateCommit { indexed: u64 },
    /// The run finished, final commit included.
    Finished {
        indexed: u64,
        elapsed_wall: Duration,
        elapsed_cpu: Duration,
    },
}

/// Reports reindex progress. Implementations write to stderr (human or JSON).
pub trait ReindexProgress: Send + Sync {
    fn report(&self, event: ReindexEvent);
}

/// Human-friendly progress lines on stderr.
pub struct StderrProgress;

impl ReindexProgress for StderrProgress {
    fn report(&self, event: ReindexEvent) {
        let line = match &event {
            ReindexEvent::Skipping { count } => {
                format!("skipping indexing of {} object(s)...\n", count)
            }
            ReindexEvent::Indexed { path, elapsed } => {
                format!("indexed {} ({:.4}s)\n", path, elapsed.as_secs_f64())
            }
            ReindexEvent::TransientFailure { path, reason } => {
                format!("WARNING: error while indexing {}: {}\n", path, reason)
            }
            ReindexEvent::IntermediateCommit { indexed } => {
                format!("intermediate commit ({} objects indexed)...\n", indexed)
            }
            ReindexEvent::Finished {
                indexed,
                elapsed_wall,
                elapsed_cpu,
            } => {
                format!(
                    "solr index rebuilt.\nindexed {} object(s) in {:.3} seconds ({:.3} cpu time).\n",
                    indexed,
                    elapsed_wall.as_secs_f64(),
                    elapsed_cpu.as_secs_f64()
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ReindexProgress for JsonProgress {
    fn report(&self, event: ReindexEvent) {
        let obj = match &event {
            ReindexEvent::Skipping { count } => serde_json::json!({
                "event": "skip",
                "count": count
            }),
            ReindexEvent::Indexed { path, elapsed } => serde_json::json!({
                "event": "indexed",
                "path": path,
                "seconds": elapsed.as_secs_f64()
            }),
            ReindexEvent::TransientFailure { path, reason } => serde_json::json!({
                "event": "transient_failure",
                "path": path,
                "reason": reason
            }),
            ReindexEvent::IntermediateCommit { indexed } => serde_json::json!({
                "event": "intermediate_commit",
                "indexed": indexed
            }),
            ReindexEvent::Finished {
                indexed,
                elapsed_wall,
                elapsed_cpu,
            } => serde_json::json!({
                "event": "finished",
                "indexed": indexed,
                "wall_seconds": elapsed_wall.as_secs_f64(),
                "cpu_seconds": elapsed_cpu.as_secs_f64()
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ReindexProgress for NoProgress {
    fn report(&self, _event: ReindexEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to the pipeline.
    pub fn reporter(&self) -> Box<dyn ReindexProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
