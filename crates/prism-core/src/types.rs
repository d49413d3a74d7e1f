//! Report types produced by batch processing.
//!
//! These are plain data: the processor fills them in, the CLI serializes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Read-only view of an image record's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Image identifier
    pub id: u64,

    /// Resolved source file, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Active effect name to parameter value
    pub effects: BTreeMap<String, Value>,
}

/// How a single effect application ended.
///
/// `NoHandler` and `BackendUnavailable` are kept apart from `Failed` so a
/// caller can tell "nothing could run" from "it ran and broke".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EffectOutcome {
    /// Backend reported success
    Applied,
    /// The factory has no handler for this effect name
    NoHandler,
    /// The backend is absent or disabled
    BackendUnavailable { reason: String },
    /// The backend ran and failed
    Failed { reason: String },
    /// The backend call exceeded its time limit
    TimedOut { timeout_ms: u64 },
    /// Not attempted because an earlier effect on the same image timed out
    /// and may still be writing its file
    Skipped { reason: String },
}

impl EffectOutcome {
    /// Whether the effect was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, EffectOutcome::Applied)
    }
}

/// Outcome of one effect on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectReport {
    /// Canonical effect name
    pub effect: String,

    /// What happened
    #[serde(flatten)]
    pub outcome: EffectOutcome,

    /// Wall time spent in the handler
    pub elapsed_ms: u64,
}

/// Everything that happened to one admitted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReport {
    /// Image identifier
    pub id: u64,

    /// Resolved source file, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Operations that mutated (or idempotently confirmed) the active set
    pub operations_applied: usize,

    /// Rejection messages for skipped operations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations_rejected: Vec<String>,

    /// Final active set the effects were applied from
    pub active: BTreeMap<String, Value>,

    /// Per-effect outcomes, in application order
    pub effects: Vec<EffectReport>,
}

impl RecordReport {
    /// True when every attempted effect was applied.
    pub fn is_clean(&self) -> bool {
        self.operations_rejected.is_empty() && self.effects.iter().all(|e| e.outcome.is_applied())
    }
}

/// Progress notifications from a batch run.
#[derive(Debug, Clone, Copy)]
pub enum BatchProgress<'a> {
    /// Admission is done; `records` will be processed
    Started { records: usize, rejected: usize },
    /// One record finished, in batch order
    Record(&'a RecordReport),
}

/// A batch entry that was skipped before any work was done for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    /// The raw key as it appeared in the batch
    pub key: String,

    /// Why it was skipped
    pub reason: String,
}

/// Counters for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Records admitted and processed
    pub records: usize,

    /// Entries rejected at admission (bad or duplicate ids, malformed lists)
    pub rejected_entries: usize,

    /// Operations skipped inside admitted records
    pub rejected_operations: usize,

    /// Effects the backend applied
    pub effects_applied: usize,

    /// Effects that did not apply, for any reason
    pub effects_failed: usize,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

/// Result of processing one batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Admitted records, in batch order
    pub records: Vec<RecordReport>,

    /// Entries skipped at admission, in batch order
    pub rejected: Vec<RejectedEntry>,

    /// Aggregate counters
    pub stats: BatchStats,
}

impl BatchReport {
    /// Look up the report for an image id.
    pub fn record(&self, id: u64) -> Option<&RecordReport> {
        self.records.iter().find(|r| r.id == id)
    }
}
