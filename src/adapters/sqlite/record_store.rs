//! SQLite adapter for RecordStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::format_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExternalRecord, Fields, LoadedRows, LocalRecord};
use crate::domain::ports::RecordStore;

#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SyncedRecordRow {
    id: String,
    external_id: Option<String>,
    fields: String,
}

fn row_to_record(row: SyncedRecordRow) -> DomainResult<LocalRecord> {
    let fields: Fields = serde_json::from_str(&row.fields)
        .map_err(|e| DomainError::SerializationError(format!("fields of {}: {e}", row.id)))?;

    Ok(LocalRecord {
        local_id: row.id,
        external_id: row.external_id,
        fields,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn not_found(collection: &str, local: &LocalRecord) -> DomainError {
    DomainError::RecordNotFound {
        collection: collection.to_string(),
        local_id: local.local_id.clone(),
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list(&self, collection: &str) -> DomainResult<LoadedRows<LocalRecord>> {
        let rows: Vec<SyncedRecordRow> = sqlx::query_as(
            "SELECT id, external_id, fields FROM synced_records
             WHERE collection = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut loaded = LoadedRows::default();
        for row in rows {
            let (id, external_id) = (row.id.clone(), row.external_id.clone());
            loaded.push(id, external_id, row_to_record(row));
        }
        Ok(loaded)
    }

    async fn insert(&self, collection: &str, record: &ExternalRecord) -> DomainResult<String> {
        let local_id = Uuid::new_v4().to_string();
        let external_id = record.normalized_id();
        let now = format_datetime(Utc::now());

        sqlx::query(
            "INSERT INTO synced_records (id, collection, external_id, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&local_id)
        .bind(collection)
        .bind(external_id)
        .bind(serde_json::to_string(&record.fields)?)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::DuplicateRecord {
                    collection: collection.to_string(),
                    external_id: external_id.to_string(),
                }
            } else {
                DomainError::from(e)
            }
        })?;

        Ok(local_id)
    }

    async fn update(
        &self,
        collection: &str,
        local: &LocalRecord,
        desired: &ExternalRecord,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE synced_records SET fields = ?1, updated_at = ?2
             WHERE id = ?3 AND collection = ?4",
        )
        .bind(serde_json::to_string(&desired.fields)?)
        .bind(format_datetime(Utc::now()))
        .bind(&local.local_id)
        .bind(collection)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, local));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, local: &LocalRecord) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM synced_records WHERE id = ? AND collection = ?")
            .bind(&local.local_id)
            .bind(collection)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, local));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use serde_json::json;

    async fn setup() -> SqliteRecordStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRecordStore::new(pool)
    }

    /// Write a row directly, bypassing the port, as manual entry or an older
    /// build might have.
    async fn insert_raw(store: &SqliteRecordStore, id: &str, external_id: Option<&str>, fields: &str) {
        let now = format_datetime(Utc::now());
        sqlx::query(
            "INSERT INTO synced_records (id, collection, external_id, fields, created_at, updated_at)
             VALUES (?1, 'projects', ?2, ?3, ?4, ?4)",
        )
        .bind(id)
        .bind(external_id)
        .bind(fields)
        .bind(&now)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = setup().await;
        let record = ExternalRecord::new(" 42 ").with_field("title", "Acme");

        let local_id = store.insert("projects", &record).await.unwrap();
        let rows = store.list("projects").await.unwrap().items;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].local_id, local_id);
        assert_eq!(rows[0].external_id.as_deref(), Some("42"));
        assert_eq!(rows[0].fields.get("title"), Some(&json!("Acme")));
        assert!(store.list("clients").await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = setup().await;
        let record = ExternalRecord::new("7");
        store.insert("projects", &record).await.unwrap();

        let err = store.insert("projects", &record).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateRecord { ref external_id, .. } if external_id == "7"));

        // Same id in a different collection is fine.
        store.insert("clients", &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let store = setup().await;
        store
            .insert("projects", &ExternalRecord::new("1").with_field("title", "old"))
            .await
            .unwrap();
        let local = store.list("projects").await.unwrap().items.remove(0);

        let desired = ExternalRecord::new("1").with_field("title", "new");
        store.update("projects", &local, &desired).await.unwrap();

        let reloaded = store.list("projects").await.unwrap().items.remove(0);
        assert_eq!(reloaded.fields.get("title"), Some(&json!("new")));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows_fail() {
        let store = setup().await;
        let ghost = LocalRecord::new("nope", Some("1".into()));

        let err = store.update("projects", &ghost, &ExternalRecord::new("1")).await.unwrap_err();
        assert!(matches!(err, DomainError::RecordNotFound { .. }));

        let err = store.delete("projects", &ghost).await.unwrap_err();
        assert!(matches!(err, DomainError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unmapped_rows_are_listed() {
        let store = setup().await;
        insert_raw(&store, "legacy-1", None, r#"{"title":"legacy"}"#).await;
        insert_raw(&store, "legacy-2", None, r#"{"title":"legacy"}"#).await;

        let rows = store.list("projects").await.unwrap().items;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.external_id.is_none()));
    }

    #[tokio::test]
    async fn test_undecodable_fields_do_not_hide_other_rows() {
        let store = setup().await;
        store
            .insert("projects", &ExternalRecord::new("1").with_field("title", "ok"))
            .await
            .unwrap();
        insert_raw(&store, "corrupt", Some("2"), "{truncated").await;
        insert_raw(&store, "not-an-object", Some("3"), "[1, 2]").await;

        let loaded = store.list("projects").await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].external_id.as_deref(), Some("1"));

        let bad: Vec<_> = loaded.unreadable.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(bad.len(), 2);
        assert!(bad.contains(&"corrupt") && bad.contains(&"not-an-object"));
        let corrupt = loaded.unreadable.iter().find(|r| r.id == "corrupt").unwrap();
        assert_eq!(corrupt.external_id.as_deref(), Some("2"));
        assert!(corrupt.reason.contains("fields of corrupt"));
    }
}
