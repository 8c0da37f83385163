//! Repository port for external-id to local-id mappings.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::CrossReferenceMap;

/// One stored mapping row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReferenceEntry {
    pub table: String,
    pub external_id: String,
    pub local_id: String,
}

#[async_trait]
pub trait CrossReferenceRepository: Send + Sync {
    /// Insert or replace a mapping.
    async fn upsert(&self, entry: &CrossReferenceEntry) -> DomainResult<()>;

    /// Remove a mapping. Returns whether it existed.
    async fn remove(&self, table: &str, external_id: &str) -> DomainResult<bool>;

    /// List mappings, optionally restricted to one table.
    async fn list(&self, table: Option<&str>) -> DomainResult<Vec<CrossReferenceEntry>>;

    /// Load the given tables into a lookup map. Loads all tables when
    /// `tables` is empty.
    async fn load(&self, tables: &[String]) -> DomainResult<CrossReferenceMap>;
}
