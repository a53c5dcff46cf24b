//! Snapshot history kept by the CLI.
//!
//! The library itself never persists anything. When `--record <file>` is
//! given, the CLI appends one [`SnapshotRecord`] per command to a JSONL file
//! so graph fingerprints, impact reports and execution results can be
//! compared over time.

use crate::error::Result;
use chrono::{DateTime, Utc};
use ripple_jsonl::{Warning, append_jsonl, read_jsonl_resilient, write_jsonl_atomic};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// What a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// A [`GraphSnapshot`](crate::graph::GraphSnapshot) summary
    Graph,
    /// An [`ImpactReport`](crate::impact::ImpactReport)
    Impact,
    /// A [`PlanSummary`](crate::scheduler::PlanSummary)
    Plan,
    /// An [`ExecutionResult`](crate::executor::ExecutionResult)
    Execution,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Impact => write!(f, "impact"),
            Self::Plan => write!(f, "plan"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

/// One line of a history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// When the record was made
    pub recorded_at: DateTime<Utc>,
    /// Payload type
    pub kind: SnapshotKind,
    /// Graph fingerprint the payload was computed from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// The serialized document
    pub payload: serde_json::Value,
}

impl SnapshotRecord {
    /// Serialize `payload` into a new record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Fails if `payload` cannot be converted to JSON.
    pub fn new<T: Serialize>(kind: SnapshotKind, payload: &T) -> Result<Self> {
        Ok(Self {
            recorded_at: Utc::now(),
            kind,
            fingerprint: None,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Attach the fingerprint of the graph the payload was computed from.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// Contents of a history file.
#[derive(Debug, Default)]
pub struct History {
    /// Records in file order
    pub records: Vec<SnapshotRecord>,
    /// Lines that could not be parsed
    pub warnings: Vec<Warning>,
}

/// Append a record to `path`, creating the file if needed.
///
/// # Errors
///
/// Fails on I/O or serialization errors.
pub async fn record(path: &Path, record: &SnapshotRecord) -> Result<()> {
    append_jsonl(path, record).await?;
    debug!(path = %path.display(), kind = %record.kind, "recorded snapshot");
    Ok(())
}

/// Load every readable record from `path`. Malformed lines are skipped and
/// reported in [`History::warnings`].
///
/// # Errors
///
/// Fails if the file cannot be opened or read.
pub async fn load(path: &Path) -> Result<History> {
    let (records, warnings) = read_jsonl_resilient(path).await?;
    for warning in &warnings {
        warn!(path = %path.display(), "{warning}");
    }
    Ok(History { records, warnings })
}

/// Rewrite `path` keeping only the newest `keep` records. Malformed lines
/// are dropped. Returns the number of records removed.
///
/// # Errors
///
/// Fails if the file cannot be read or replaced.
pub async fn prune(path: &Path, keep: usize) -> Result<usize> {
    let History { records, warnings } = load(path).await?;
    let removed = records.len().saturating_sub(keep);
    if removed == 0 && warnings.is_empty() {
        return Ok(0);
    }

    write_jsonl_atomic(path, &records[removed..]).await?;
    debug!(path = %path.display(), removed, kept = records.len() - removed, "pruned history");
    Ok(removed)
}
