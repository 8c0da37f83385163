//! Results of reconciliation and of applying it to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sync_record::{ExternalRecord, LocalRecord};

/// A reference field whose external id had no entry in its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub external_id: String,
    pub field: String,
    pub table: String,
    /// The raw value that failed to resolve, as a string.
    pub value: String,
}

/// The pure decision produced by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_insert: Vec<ExternalRecord>,
    /// Matched pairs whose mapped fields differ from the local row.
    pub to_update: Vec<(LocalRecord, ExternalRecord)>,
    pub to_delete: Vec<LocalRecord>,
    /// Matched pairs with nothing to change.
    pub unchanged: Vec<(LocalRecord, ExternalRecord)>,
    /// Local rows without an external id. Left untouched.
    pub unmapped: Vec<LocalRecord>,
    /// External ids that appeared more than once in the desired set, one
    /// entry per dropped record.
    pub duplicates_dropped: Vec<String>,
    /// Desired records rejected before matching (blank external id).
    pub rejected: Vec<ExternalRecord>,
    pub unresolved_references: Vec<UnresolvedReference>,
}

impl ReconciliationPlan {
    /// True when applying the plan would not touch storage.
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Storage action a per-record error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Insert,
    Update,
    Delete,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One failed storage action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub external_id: Option<String>,
    pub local_id: Option<String>,
    pub action: SyncAction,
    pub message: String,
}

/// Outcome of a sync pass, returned to whoever triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub collection: String,
    pub source: String,
    pub dry_run: bool,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Records not synced for data reasons: blank ids, unmapped or
    /// unreadable local rows, and inserts held back behind unreadable rows.
    pub skipped: usize,
    /// Local rows whose stored fields could not be decoded.
    #[serde(default)]
    pub unreadable_rows: usize,
    pub failed: usize,
    pub duplicates_dropped: usize,
    pub unresolved_references: usize,
    pub errors: Vec<RecordError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    pub fn new(collection: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            source: source.into(),
            dry_run: false,
            fetched: 0,
            inserted: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
            unreadable_rows: 0,
            failed: 0,
            duplicates_dropped: 0,
            unresolved_references: 0,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Count a failed action and keep its error.
    pub fn record_failure(&mut self, error: RecordError) {
        self.failed += 1;
        self.errors.push(error);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
