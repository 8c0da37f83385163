//! Integration tests for RecurrenceService over the SQLite repository.

use agencyflow::adapters::sqlite::{create_migrated_test_pool, SqliteRecurringTaskRepository};
use agencyflow::domain::errors::DomainError;
use agencyflow::domain::models::{RecurrenceKind, RecurrenceRule, RecurringTask, RecurringTaskStatus};
use agencyflow::domain::ports::RecurringTaskFilter;
use agencyflow::services::RecurrenceService;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

async fn setup() -> RecurrenceService<SqliteRecurringTaskRepository> {
    setup_with_pool().await.1
}

async fn setup_with_pool() -> (SqlitePool, RecurrenceService<SqliteRecurringTaskRepository>) {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    let service = RecurrenceService::new(Arc::new(SqliteRecurringTaskRepository::new(pool.clone())));
    (pool, service)
}

/// Write a task row directly, as an older build or a manual edit might.
async fn insert_raw_task(pool: &SqlitePool, id: &str, rule_data: &str, next: &str, created_at: &str) {
    sqlx::query(
        "INSERT INTO recurring_tasks
         (id, title, description, rule_kind, rule_data, status,
          next_occurrence, last_occurrence, occurrence_count, created_at, updated_at)
         VALUES (?1, 'raw', '', 'daily', ?2, 'active', ?3, NULL, 0, ?4, ?4)",
    )
    .bind(id)
    .bind(rule_data)
    .bind(next)
    .bind(created_at)
    .execute(pool)
    .await
    .expect("failed to insert raw task");
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

#[tokio::test]
async fn test_create_seeds_next_occurrence_from_now() {
    let service = setup().await;
    // 2024-01-01 is a Monday.
    let now = at(2024, 1, 1, 8);
    let rule = RecurrenceRule::weekly().on_days([1, 3, 5]);

    let task = service
        .create(RecurringTask::new("Client check-in", rule), now)
        .await
        .unwrap();
    assert_eq!(task.next_occurrence, Some(at(2024, 1, 3, 8)));

    let stored = service.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Client check-in");
    assert_eq!(stored.rule.valid_days_of_week(), vec![1, 3, 5]);
    assert_eq!(stored.next_occurrence, Some(at(2024, 1, 3, 8)));
}

#[tokio::test]
async fn test_create_rejects_blank_title_and_unknown_rule() {
    let service = setup().await;
    let now = at(2024, 1, 1, 8);

    let err = service
        .create(RecurringTask::new("   ", RecurrenceRule::daily()), now)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));

    let bogus = RecurrenceRule::new(RecurrenceKind::parse("fortnightly"));
    let err = service
        .create(RecurringTask::new("Invoices", bogus), now)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));

    assert!(service.list(RecurringTaskFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_advance_due_catches_up_and_is_repeatable() {
    let service = setup().await;
    let task = service
        .create(
            RecurringTask::new("Backup report", RecurrenceRule::daily()).starting_at(at(2024, 1, 1, 8)),
            at(2024, 1, 1, 0),
        )
        .await
        .unwrap();

    // Scheduler was down for three days.
    let now = at(2024, 1, 4, 9);
    let summary = service.advance_due(now).await.unwrap();
    assert_eq!(summary.due, 1);
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.missed, 3);
    assert_eq!(summary.fired[0].due_at, at(2024, 1, 1, 8));
    assert_eq!(summary.fired[0].next_occurrence, at(2024, 1, 5, 8));

    let stored = service.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.last_occurrence, Some(at(2024, 1, 1, 8)));
    assert_eq!(stored.next_occurrence, Some(at(2024, 1, 5, 8)));
    assert_eq!(stored.occurrence_count, 1);

    let again = service.advance_due(now).await.unwrap();
    assert_eq!(again.due, 0);
    assert!(again.fired.is_empty());
}

#[tokio::test]
async fn test_corrupt_rows_do_not_block_healthy_tasks() {
    let (pool, service) = setup_with_pool().await;
    let healthy = service
        .create(
            RecurringTask::new("Backup report", RecurrenceRule::daily()).starting_at(at(2024, 1, 1, 8)),
            at(2024, 1, 1, 0),
        )
        .await
        .unwrap();

    let stamp = "2024-01-01T07:00:00.000000Z";
    insert_raw_task(&pool, "garbled-rule", "{\"rule\":", stamp, stamp).await;
    insert_raw_task(&pool, "bad-timestamp", r#"{"rule":"daily"}"#, stamp, "yesterday").await;
    let negative = uuid::Uuid::new_v4();
    insert_raw_task(&pool, &negative.to_string(), r#"{"rule":"daily","interval":-1}"#, stamp, stamp).await;

    let summary = service.advance_due(at(2024, 1, 1, 9)).await.unwrap();

    assert_eq!(summary.due, 4);
    assert_eq!(summary.advanced, 2);
    assert_eq!(summary.failed, 2);
    let mut failed: Vec<_> = summary.errors.iter().map(|e| e.task_id.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["bad-timestamp", "garbled-rule"]);

    let stored = service.get(healthy.id).await.unwrap().unwrap();
    assert_eq!(stored.next_occurrence, Some(at(2024, 1, 2, 8)));
    assert_eq!(stored.occurrence_count, 1);

    // A negative stored interval is read as one.
    let clamped = service.get(negative).await.unwrap().unwrap();
    assert_eq!(clamped.rule.interval, 1);
    assert_eq!(clamped.next_occurrence, Some(at(2024, 1, 2, 7)));
}

#[tokio::test]
async fn test_paused_tasks_are_not_advanced() {
    let service = setup().await;
    let task = service
        .create(
            RecurringTask::new("Invoice run", RecurrenceRule::monthly().on_day_of_month(1))
                .starting_at(at(2024, 2, 1, 8)),
            at(2024, 1, 15, 0),
        )
        .await
        .unwrap();

    let paused = service.pause(task.id).await.unwrap();
    assert_eq!(paused.status, RecurringTaskStatus::Paused);
    assert_eq!(service.advance_due(at(2024, 2, 2, 0)).await.unwrap().due, 0);

    let active = service
        .list(RecurringTaskFilter {
            status: Some(RecurringTaskStatus::Active),
        })
        .await
        .unwrap();
    assert!(active.is_empty());

    service.resume(task.id).await.unwrap();
    let summary = service.advance_due(at(2024, 2, 2, 0)).await.unwrap();
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.fired[0].next_occurrence, at(2024, 3, 1, 8));
}

#[tokio::test]
async fn test_preview_clamps_month_end() {
    let service = setup().await;
    let task = service
        .create(
            RecurringTask::new("Month-end close", RecurrenceRule::monthly().on_day_of_month(31))
                .starting_at(at(2024, 1, 31, 17)),
            at(2024, 1, 1, 0),
        )
        .await
        .unwrap();

    let upcoming = service.preview(task.id, 4).await.unwrap();
    assert_eq!(
        upcoming,
        vec![at(2024, 1, 31, 17), at(2024, 2, 29, 17), at(2024, 3, 31, 17), at(2024, 4, 30, 17)]
    );
    assert!(service.preview(task.id, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_task_operations_fail() {
    let service = setup().await;
    let id = uuid::Uuid::new_v4();

    assert!(matches!(
        service.pause(id).await.unwrap_err(),
        DomainError::RecurringTaskNotFound(missing) if missing == id
    ));
    assert!(matches!(
        service.delete(id).await.unwrap_err(),
        DomainError::RecurringTaskNotFound(_)
    ));
    assert!(service.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_removes_task() {
    let service = setup().await;
    let task = service
        .create(RecurringTask::new("Standup", RecurrenceRule::daily()), at(2024, 1, 1, 9))
        .await
        .unwrap();

    service.delete(task.id).await.unwrap();
    assert!(service.get(task.id).await.unwrap().is_none());
}
