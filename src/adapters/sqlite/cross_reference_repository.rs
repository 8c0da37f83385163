//! SQLite adapter for CrossReferenceRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::format_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::CrossReferenceMap;
use crate::domain::ports::{CrossReferenceEntry, CrossReferenceRepository};

#[derive(Clone)]
pub struct SqliteCrossReferenceRepository {
    pool: SqlitePool,
}

impl SqliteCrossReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CrossReferenceRow {
    table_name: String,
    external_id: String,
    local_id: String,
}

impl From<CrossReferenceRow> for CrossReferenceEntry {
    fn from(row: CrossReferenceRow) -> Self {
        Self {
            table: row.table_name,
            external_id: row.external_id,
            local_id: row.local_id,
        }
    }
}

#[async_trait]
impl CrossReferenceRepository for SqliteCrossReferenceRepository {
    async fn upsert(&self, entry: &CrossReferenceEntry) -> DomainResult<()> {
        let table = entry.table.trim();
        let external_id = entry.external_id.trim();
        if table.is_empty() || external_id.is_empty() {
            return Err(DomainError::ValidationFailed(
                "cross-reference table and external id must not be blank".to_string(),
            ));
        }

        sqlx::query(
            "INSERT INTO cross_references (table_name, external_id, local_id, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(table_name, external_id)
             DO UPDATE SET local_id = excluded.local_id, updated_at = excluded.updated_at",
        )
        .bind(table)
        .bind(external_id)
        .bind(&entry.local_id)
        .bind(format_datetime(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, table: &str, external_id: &str) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM cross_references WHERE table_name = ? AND external_id = ?")
            .bind(table.trim())
            .bind(external_id.trim())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, table: Option<&str>) -> DomainResult<Vec<CrossReferenceEntry>> {
        let rows: Vec<CrossReferenceRow> = match table {
            Some(table) => {
                sqlx::query_as(
                    "SELECT table_name, external_id, local_id FROM cross_references
                     WHERE table_name = ? ORDER BY external_id",
                )
                .bind(table.trim())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT table_name, external_id, local_id FROM cross_references
                     ORDER BY table_name, external_id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(CrossReferenceEntry::from).collect())
    }

    async fn load(&self, tables: &[String]) -> DomainResult<CrossReferenceMap> {
        let mut entries = Vec::new();
        if tables.is_empty() {
            entries = self.list(None).await?;
        } else {
            for table in tables {
                entries.extend(self.list(Some(table)).await?);
            }
        }

        let mut map = CrossReferenceMap::new();
        for entry in entries {
            map.insert(entry.table, entry.external_id, entry.local_id);
        }
        Ok(map)
    }
}
