//! Service for managing recurring tasks and firing due occurrences.
//!
//! Coordinates between the `RecurringTaskRepository` (persistence) and the
//! pure occurrence computation in [`recurrence_engine`](super::recurrence_engine).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RecurrenceKind, RecurringTask, RecurringTaskStatus};
use crate::domain::ports::{RecurringTaskFilter, RecurringTaskRepository};
use crate::services::recurrence_engine::{compute_next_occurrence, occurrences};

/// Upper bound on catch-up steps for one task in one run.
const MAX_CATCH_UP_STEPS: u64 = 10_000;

/// An occurrence that became due and was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredOccurrence {
    pub task_id: Uuid,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub next_occurrence: DateTime<Utc>,
}

/// A task that could not be advanced.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceError {
    /// Task id as stored. Unreadable rows may not hold a valid UUID.
    pub task_id: String,
    pub message: String,
}

/// Result of one scheduler run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdvanceSummary {
    pub due: usize,
    pub advanced: usize,
    /// Occurrences skipped while catching up on a task that fell behind.
    pub missed: u64,
    pub failed: usize,
    pub fired: Vec<FiredOccurrence>,
    pub errors: Vec<AdvanceError>,
}

pub struct RecurrenceService<R: RecurringTaskRepository> {
    repo: Arc<R>,
}

impl<R: RecurringTaskRepository> RecurrenceService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Validate, seed and persist a new recurring task.
    ///
    /// When the task carries no first occurrence it is seeded from `now`.
    pub async fn create(&self, mut task: RecurringTask, now: DateTime<Utc>) -> DomainResult<RecurringTask> {
        if task.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Recurring task title cannot be empty".to_string(),
            ));
        }
        if task.rule.kind == RecurrenceKind::Unrecognized {
            return Err(DomainError::ValidationFailed(
                "Recurrence rule must be one of: daily, weekly, monthly, yearly".to_string(),
            ));
        }
        task.rule.interval = task.rule.effective_interval();

        if task.next_occurrence.is_none() {
            task.next_occurrence = Some(compute_next_occurrence(now, &task.rule));
        }

        self.repo.create(&task).await?;
        info!(
            task_id = %task.id,
            rule = %task.rule.kind,
            next_occurrence = ?task.next_occurrence,
            "recurring task created"
        );
        Ok(task)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Option<RecurringTask>> {
        self.repo.get(id).await
    }

    pub async fn list(&self, filter: RecurringTaskFilter) -> DomainResult<Vec<RecurringTask>> {
        self.repo.list(filter).await
    }

    /// Pause a task; the scheduler skips it until resumed.
    pub async fn pause(&self, id: Uuid) -> DomainResult<RecurringTask> {
        self.set_status(id, RecurringTaskStatus::Paused).await
    }

    /// Resume a paused task.
    pub async fn resume(&self, id: Uuid) -> DomainResult<RecurringTask> {
        self.set_status(id, RecurringTaskStatus::Active).await
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.require(id).await?;
        self.repo.delete(id).await
    }

    /// The next `count` occurrences of a task, starting with the pending one.
    pub async fn preview(&self, id: Uuid, count: usize) -> DomainResult<Vec<DateTime<Utc>>> {
        let task = self.require(id).await?;
        let Some(next) = task.next_occurrence else {
            return Ok(Vec::new());
        };
        let mut upcoming = Vec::with_capacity(count);
        if count > 0 {
            upcoming.push(next);
            upcoming.extend(occurrences(next, &task.rule).take(count - 1));
        }
        Ok(upcoming)
    }

    /// Fire every occurrence due at `now`.
    ///
    /// Each due task records its pending occurrence as fired and steps its
    /// next occurrence forward from that occurrence until it lies after
    /// `now`. A stored task that cannot be decoded, or that fails to
    /// persist, is counted as failed and the run continues with the next.
    pub async fn advance_due(&self, now: DateTime<Utc>) -> DomainResult<AdvanceSummary> {
        let loaded = self.repo.list_due(now).await?;
        let due: Vec<RecurringTask> = loaded.items.into_iter().filter(|t| t.is_due(now)).collect();
        let mut summary = AdvanceSummary {
            due: due.len() + loaded.unreadable.len(),
            ..AdvanceSummary::default()
        };

        for row in loaded.unreadable {
            warn!(task_id = %row.id, reason = %row.reason, "recurring task row unreadable; skipping");
            summary.failed += 1;
            summary.errors.push(AdvanceError {
                task_id: row.id,
                message: row.reason,
            });
        }

        for mut task in due {
            let Some(due_at) = task.next_occurrence else {
                continue;
            };

            let (next, missed) = step_past(due_at, now, &task);
            if next <= due_at {
                warn!(task_id = %task.id, rule = %task.rule.kind, "recurrence rule does not advance; skipping");
                summary.failed += 1;
                summary.errors.push(AdvanceError {
                    task_id: task.id.to_string(),
                    message: format!("rule '{}' does not advance", task.rule.kind),
                });
                continue;
            }

            task.last_occurrence = Some(due_at);
            task.next_occurrence = Some(next);
            task.occurrence_count += 1;
            task.updated_at = now;

            match self.repo.update(&task).await {
                Ok(()) => {
                    debug!(task_id = %task.id, %due_at, %next, missed, "occurrence fired");
                    summary.advanced += 1;
                    summary.missed += missed;
                    summary.fired.push(FiredOccurrence {
                        task_id: task.id,
                        title: task.title.clone(),
                        due_at,
                        next_occurrence: next,
                    });
                }
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "failed to persist recurring task");
                    summary.failed += 1;
                    summary.errors.push(AdvanceError {
                        task_id: task.id.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            due = summary.due,
            advanced = summary.advanced,
            missed = summary.missed,
            failed = summary.failed,
            "recurrence run finished"
        );
        Ok(summary)
    }

    async fn require(&self, id: Uuid) -> DomainResult<RecurringTask> {
        self.repo
            .get(id)
            .await?
            .ok_or(DomainError::RecurringTaskNotFound(id))
    }

    async fn set_status(&self, id: Uuid, status: RecurringTaskStatus) -> DomainResult<RecurringTask> {
        let mut task = self.require(id).await?;
        task.status = status;
        task.updated_at = Utc::now();
        self.repo.update(&task).await?;
        Ok(task)
    }
}

/// Step from `due_at` until strictly after `now`. Returns the new next
/// occurrence and how many intermediate occurrences were skipped.
fn step_past(due_at: DateTime<Utc>, now: DateTime<Utc>, task: &RecurringTask) -> (DateTime<Utc>, u64) {
    let mut next = compute_next_occurrence(due_at, &task.rule);
    let mut missed = 0;
    while next <= now && missed < MAX_CATCH_UP_STEPS {
        let after = compute_next_occurrence(next, &task.rule);
        if after <= next {
            break;
        }
        next = after;
        missed += 1;
    }
    (next, missed)
}
