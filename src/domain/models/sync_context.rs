//! Per-pass reconciliation context.
//!
//! A [`SyncContext`] is built once per reconciliation pass and passed by
//! reference into the engine. It owns the cross-reference tables and the
//! list of fields that must be resolved through them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Read-only lookup tables mapping external ids to local ids.
///
/// Tables are named by what they map, e.g. `websites`, `operators`,
/// `clients`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceMap {
    tables: HashMap<String, HashMap<String, String>>,
}

impl CrossReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one mapping. Later inserts for the same key replace earlier ones.
    pub fn insert(
        &mut self,
        table: impl Into<String>,
        external_id: impl Into<String>,
        local_id: impl Into<String>,
    ) {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(external_id.into(), local_id.into());
    }

    pub fn with(
        mut self,
        table: impl Into<String>,
        external_id: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Self {
        self.insert(table, external_id, local_id);
        self
    }

    /// Resolve `external_id` in `table`.
    pub fn resolve(&self, table: &str, external_id: &str) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|entries| entries.get(external_id.trim()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record field whose value is an external id to be translated through
/// a cross-reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceField {
    pub field: String,
    pub table: String,
}

impl ReferenceField {
    pub fn new(field: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            table: table.into(),
        }
    }
}

/// Which record wins when the external feed repeats an id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first record encountered for an id.
    #[default]
    KeepFirst,
    /// Keep the last record encountered for an id.
    KeepLast,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepFirst => "keep_first",
            Self::KeepLast => "keep_last",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keep_first" | "keep-first" | "first" => Some(Self::KeepFirst),
            "keep_last" | "keep-last" | "last" => Some(Self::KeepLast),
            _ => None,
        }
    }
}

/// Everything one reconciliation pass needs besides the two record sets.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    /// Name of the local collection being reconciled, e.g. `tickets`.
    pub collection: String,
    pub cross_refs: CrossReferenceMap,
    pub reference_fields: Vec<ReferenceField>,
    pub duplicate_policy: DuplicatePolicy,
}

impl SyncContext {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_cross_refs(mut self, cross_refs: CrossReferenceMap) -> Self {
        self.cross_refs = cross_refs;
        self
    }

    pub fn with_reference(mut self, field: impl Into<String>, table: impl Into<String>) -> Self {
        self.reference_fields.push(ReferenceField::new(field, table));
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}
