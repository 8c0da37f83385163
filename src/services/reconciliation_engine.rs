//! Diff of an external record set against the locally stored set.
//!
//! [`reconcile`] is a single-pass, stateless transform. It decides which
//! records to insert, update and delete but performs no I/O; applying the
//! plan is the job of [`SyncService`](crate::services::SyncService).
//!
//! # Invariants
//! - Every desired record that survives normalization and deduplication
//!   lands in exactly one of `to_insert`, `to_update`, `unchanged`.
//! - Every local record with an external id lands in exactly one of
//!   `to_update`, `unchanged`, `to_delete`.
//! - Local records without an external id land in `unmapped` and nothing
//!   else.
//! - Output lists keep the order of the input lists.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::domain::models::{
    value_as_key, DuplicatePolicy, ExternalRecord, LocalRecord, ReconciliationPlan, SyncContext,
    UnresolvedReference,
};

/// Compute the reconciliation plan for one pass.
pub fn reconcile(
    desired: &[ExternalRecord],
    current: &[LocalRecord],
    ctx: &SyncContext,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    let normalized = normalize_ids(desired, &mut plan);
    let survivors = deduplicate(normalized, ctx.duplicate_policy, &mut plan);

    // First local row per external id is the match; later rows with the
    // same id are local duplicates.
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (position, local) in current.iter().enumerate() {
        if let Some(id) = local.normalized_id() {
            index.entry(id).or_insert(position);
        }
    }

    let mut desired_ids: HashSet<String> = HashSet::with_capacity(survivors.len());
    for record in survivors {
        let mapped = resolve_references(record, ctx, &mut plan.unresolved_references);
        desired_ids.insert(mapped.external_id.clone());

        match index.get(mapped.external_id.as_str()) {
            None => plan.to_insert.push(mapped),
            Some(&position) => {
                let local = current[position].clone();
                if local.fields == mapped.fields {
                    plan.unchanged.push((local, mapped));
                } else {
                    plan.to_update.push((local, mapped));
                }
            }
        }
    }

    for (position, local) in current.iter().enumerate() {
        match local.normalized_id() {
            None => plan.unmapped.push(local.clone()),
            Some(id) => {
                let is_primary = index.get(id) == Some(&position);
                if !is_primary || !desired_ids.contains(id) {
                    plan.to_delete.push(local.clone());
                }
            }
        }
    }

    plan
}

/// Trim external ids; reject records whose id is blank.
fn normalize_ids(desired: &[ExternalRecord], plan: &mut ReconciliationPlan) -> Vec<ExternalRecord> {
    let mut normalized = Vec::with_capacity(desired.len());
    for record in desired {
        let id = record.normalized_id();
        if id.is_empty() {
            plan.rejected.push(record.clone());
            continue;
        }
        let mut record = record.clone();
        if record.external_id.len() != id.len() {
            record.external_id = id.to_string();
        }
        normalized.push(record);
    }
    normalized
}

/// Collapse repeated external ids under `policy`.
fn deduplicate(
    records: Vec<ExternalRecord>,
    policy: DuplicatePolicy,
    plan: &mut ReconciliationPlan,
) -> Vec<ExternalRecord> {
    match policy {
        DuplicatePolicy::KeepFirst => {
            let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
            let mut kept = Vec::with_capacity(records.len());
            for record in records {
                if seen.insert(record.external_id.clone()) {
                    kept.push(record);
                } else {
                    plan.duplicates_dropped.push(record.external_id);
                }
            }
            kept
        }
        DuplicatePolicy::KeepLast => {
            let mut last: HashMap<String, usize> = HashMap::with_capacity(records.len());
            for (position, record) in records.iter().enumerate() {
                last.insert(record.external_id.clone(), position);
            }
            let mut kept = Vec::with_capacity(last.len());
            for (position, record) in records.into_iter().enumerate() {
                if last.get(&record.external_id) == Some(&position) {
                    kept.push(record);
                } else {
                    plan.duplicates_dropped.push(record.external_id);
                }
            }
            kept
        }
    }
}

/// Translate reference fields to local ids. Unresolvable values become
/// `null` and are reported; the record itself is kept.
fn resolve_references(
    mut record: ExternalRecord,
    ctx: &SyncContext,
    unresolved: &mut Vec<UnresolvedReference>,
) -> ExternalRecord {
    for reference in &ctx.reference_fields {
        let Some(value) = record.fields.get_mut(&reference.field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let resolved = value_as_key(value)
            .and_then(|key| ctx.cross_refs.resolve(&reference.table, &key))
            .map(str::to_string);

        if let Some(local_id) = resolved {
            *value = Value::String(local_id);
        } else {
            unresolved.push(UnresolvedReference {
                external_id: record.external_id.clone(),
                field: reference.field.clone(),
                table: reference.table.clone(),
                value: value_as_key(value).unwrap_or_else(|| value.to_string()),
            });
            *value = Value::Null;
        }
    }
    record
}
