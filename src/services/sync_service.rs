//! Service that runs one portal reconciliation pass end to end.
//!
//! fetch (whole-batch failure) → load local rows → `reconcile` → apply
//! insert, update, delete in that order, one record at a time. Per-record
//! storage failures are counted in the [`SyncSummary`] and never abort the
//! pass.
//!
//! Local rows that cannot be decoded are skipped and left in place. A
//! desired record whose id matches one of them is held back rather than
//! inserted next to it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ExternalRecord, ReconciliationPlan, RecordError, SyncAction, SyncContext, SyncSummary,
    UnreadableRow,
};
use crate::domain::ports::{ExternalSource, RecordStore};
use crate::services::reconciliation_engine::reconcile;

/// Everything one pass decided before writing.
#[derive(Debug, Clone)]
pub struct PreparedPass {
    pub desired: Vec<ExternalRecord>,
    pub plan: ReconciliationPlan,
    /// Local rows that could not be decoded.
    pub unreadable: Vec<UnreadableRow>,
    /// Desired records withheld because an unreadable row holds their id.
    pub held_back: Vec<ExternalRecord>,
}

pub struct SyncService<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> SyncService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch and diff without touching storage.
    pub async fn plan(&self, source: &dyn ExternalSource, ctx: &SyncContext) -> DomainResult<PreparedPass> {
        let desired = fetch(source).await?;
        let current = self.store.list(&ctx.collection).await?;
        let mut plan = reconcile(&desired, &current.items, ctx);

        let mut held_back = Vec::new();
        if !current.unreadable.is_empty() {
            let (blocked, insertable): (Vec<_>, Vec<_>) = plan.to_insert.into_iter().partition(|record| {
                let id = record.external_id.trim();
                current
                    .unreadable
                    .iter()
                    .any(|row| row.external_id.as_deref().map(str::trim) == Some(id))
            });
            plan.to_insert = insertable;
            held_back = blocked;
        }

        Ok(PreparedPass {
            desired,
            plan,
            unreadable: current.unreadable,
            held_back,
        })
    }

    /// Run one pass. With `dry_run` the plan is summarized but not applied.
    #[instrument(skip_all, fields(collection = %ctx.collection, source = source.name()))]
    pub async fn run(
        &self,
        source: &dyn ExternalSource,
        ctx: &SyncContext,
        dry_run: bool,
    ) -> DomainResult<SyncSummary> {
        let mut summary = SyncSummary::new(&ctx.collection, source.name());
        summary.dry_run = dry_run;

        let PreparedPass {
            desired,
            plan,
            unreadable,
            held_back,
        } = self.plan(source, ctx).await?;
        summary.fetched = desired.len();
        summary.unchanged = plan.unchanged.len();
        summary.skipped = plan.rejected.len() + plan.unmapped.len() + unreadable.len() + held_back.len();
        summary.unreadable_rows = unreadable.len();
        summary.duplicates_dropped = plan.duplicates_dropped.len();
        summary.unresolved_references = plan.unresolved_references.len();

        for row in &unreadable {
            warn!(
                local_id = %row.id,
                external_id = ?row.external_id,
                reason = %row.reason,
                "local row unreadable; left untouched"
            );
        }
        for record in &held_back {
            warn!(external_id = %record.external_id, "insert held back; an unreadable local row has this id");
        }

        for dup in &plan.duplicates_dropped {
            debug!(external_id = %dup, "duplicate external id dropped");
        }
        for unresolved in &plan.unresolved_references {
            warn!(
                external_id = %unresolved.external_id,
                field = %unresolved.field,
                table = %unresolved.table,
                value = %unresolved.value,
                "cross-reference unresolved; field cleared"
            );
        }

        if dry_run {
            summary.inserted = plan.to_insert.len();
            summary.updated = plan.to_update.len();
            summary.deleted = plan.to_delete.len();
        } else {
            self.apply(&plan, &ctx.collection, &mut summary).await;
        }

        summary.finished_at = Utc::now();
        info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            dry_run,
            "sync pass finished"
        );
        Ok(summary)
    }

    /// Apply a plan sequentially: inserts, then updates, then deletes.
    pub async fn apply(&self, plan: &ReconciliationPlan, collection: &str, summary: &mut SyncSummary) {
        for record in &plan.to_insert {
            match self.store.insert(collection, record).await {
                Ok(local_id) => {
                    debug!(external_id = %record.external_id, %local_id, "record inserted");
                    summary.inserted += 1;
                }
                Err(err) => {
                    warn!(external_id = %record.external_id, error = %err, "insert failed");
                    summary.record_failure(RecordError {
                        external_id: Some(record.external_id.clone()),
                        local_id: None,
                        action: SyncAction::Insert,
                        message: err.to_string(),
                    });
                }
            }
        }

        for (local, desired) in &plan.to_update {
            match self.store.update(collection, local, desired).await {
                Ok(()) => {
                    debug!(external_id = %desired.external_id, local_id = %local.local_id, "record updated");
                    summary.updated += 1;
                }
                Err(err) => {
                    warn!(external_id = %desired.external_id, error = %err, "update failed");
                    summary.record_failure(RecordError {
                        external_id: Some(desired.external_id.clone()),
                        local_id: Some(local.local_id.clone()),
                        action: SyncAction::Update,
                        message: err.to_string(),
                    });
                }
            }
        }

        for local in &plan.to_delete {
            match self.store.delete(collection, local).await {
                Ok(()) => {
                    debug!(local_id = %local.local_id, "record deleted");
                    summary.deleted += 1;
                }
                Err(err) => {
                    warn!(local_id = %local.local_id, error = %err, "delete failed");
                    summary.record_failure(RecordError {
                        external_id: local.external_id.clone(),
                        local_id: Some(local.local_id.clone()),
                        action: SyncAction::Delete,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Fetch from the source, folding any error into a whole-batch fetch failure.
async fn fetch(source: &dyn ExternalSource) -> DomainResult<Vec<ExternalRecord>> {
    source.fetch().await.map_err(|err| match err {
        DomainError::SourceFetchFailed { .. } => err,
        other => DomainError::fetch_failed(source.name(), other.to_string()),
    })
}
