//! Repository port for recurring task persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LoadedRows, RecurringTask, RecurringTaskStatus};

/// Filter for listing recurring tasks.
#[derive(Debug, Default)]
pub struct RecurringTaskFilter {
    pub status: Option<RecurringTaskStatus>,
}

#[async_trait]
pub trait RecurringTaskRepository: Send + Sync {
    /// Create a new recurring task.
    async fn create(&self, task: &RecurringTask) -> DomainResult<()>;

    /// Get a recurring task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<RecurringTask>>;

    /// Update an existing recurring task.
    async fn update(&self, task: &RecurringTask) -> DomainResult<()>;

    /// Delete a recurring task by ID.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List recurring tasks with optional filter.
    async fn list(&self, filter: RecurringTaskFilter) -> DomainResult<Vec<RecurringTask>>;

    /// List active tasks whose next occurrence is at or before `now`.
    ///
    /// A row that cannot be decoded is reported as unreadable and does not
    /// hide the other due tasks.
    async fn list_due(&self, now: DateTime<Utc>) -> DomainResult<LoadedRows<RecurringTask>>;
}
