//! SQLite adapter for RecurringTaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LoadedRows, RecurrenceRule, RecurringTask, RecurringTaskStatus};
use crate::domain::ports::{RecurringTaskFilter, RecurringTaskRepository};

#[derive(Clone)]
pub struct SqliteRecurringTaskRepository {
    pool: SqlitePool,
}

impl SqliteRecurringTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RecurringTaskRow {
    id: String,
    title: String,
    description: String,
    #[allow(dead_code)]
    rule_kind: String,
    rule_data: String,
    status: String,
    next_occurrence: Option<String>,
    last_occurrence: Option<String>,
    occurrence_count: i64,
    created_at: String,
    updated_at: String,
}

fn row_to_task(row: RecurringTaskRow) -> DomainResult<RecurringTask> {
    let rule: RecurrenceRule = serde_json::from_str(&row.rule_data)
        .map_err(|e| DomainError::SerializationError(format!("rule_data: {e}")))?;

    Ok(RecurringTask {
        id: parse_uuid(&row.id)?,
        title: row.title,
        description: row.description,
        rule,
        status: RecurringTaskStatus::from_str(&row.status).unwrap_or(RecurringTaskStatus::Active),
        next_occurrence: parse_optional_datetime(row.next_occurrence)?,
        last_occurrence: parse_optional_datetime(row.last_occurrence)?,
        occurrence_count: u64::try_from(row.occurrence_count).unwrap_or_default(),
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

fn count_to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecurringTaskRepository for SqliteRecurringTaskRepository {
    async fn create(&self, task: &RecurringTask) -> DomainResult<()> {
        let rule_data = serde_json::to_string(&task.rule)?;

        sqlx::query(
            "INSERT INTO recurring_tasks
             (id, title, description, rule_kind, rule_data, status,
              next_occurrence, last_occurrence, occurrence_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.rule.kind.as_str())
        .bind(&rule_data)
        .bind(task.status.as_str())
        .bind(task.next_occurrence.map(format_datetime))
        .bind(task.last_occurrence.map(format_datetime))
        .bind(count_to_i64(task.occurrence_count))
        .bind(format_datetime(task.created_at))
        .bind(format_datetime(task.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<RecurringTask>> {
        let row: Option<RecurringTaskRow> =
            sqlx::query_as("SELECT * FROM recurring_tasks WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_task).transpose()
    }

    async fn update(&self, task: &RecurringTask) -> DomainResult<()> {
        let rule_data = serde_json::to_string(&task.rule)?;

        let result = sqlx::query(
            "UPDATE recurring_tasks SET
             title = ?2, description = ?3, rule_kind = ?4, rule_data = ?5, status = ?6,
             next_occurrence = ?7, last_occurrence = ?8, occurrence_count = ?9, updated_at = ?10
             WHERE id = ?1",
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.rule.kind.as_str())
        .bind(&rule_data)
        .bind(task.status.as_str())
        .bind(task.next_occurrence.map(format_datetime))
        .bind(task.last_occurrence.map(format_datetime))
        .bind(count_to_i64(task.occurrence_count))
        .bind(format_datetime(task.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RecurringTaskNotFound(task.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM recurring_tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: RecurringTaskFilter) -> DomainResult<Vec<RecurringTask>> {
        let rows = if let Some(status) = filter.status {
            sqlx::query_as::<_, RecurringTaskRow>(
                "SELECT * FROM recurring_tasks WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, RecurringTaskRow>(
                "SELECT * FROM recurring_tasks ORDER BY created_at DESC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_due(&self, now: DateTime<Utc>) -> DomainResult<LoadedRows<RecurringTask>> {
        let rows = sqlx::query_as::<_, RecurringTaskRow>(
            "SELECT * FROM recurring_tasks
             WHERE status = 'active' AND next_occurrence IS NOT NULL AND next_occurrence <= ?
             ORDER BY next_occurrence ASC",
        )
        .bind(format_datetime(now))
        .fetch_all(&self.pool)
        .await?;

        let mut loaded = LoadedRows::default();
        for row in rows {
            let id = row.id.clone();
            loaded.push(id, None, row_to_task(row));
        }
        Ok(loaded)
    }
}
