//! Repository port for locally persisted synced records.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExternalRecord, LoadedRows, LocalRecord};

/// Persistence adapter the sync service applies a reconciliation plan to.
///
/// Every method is its own atomic unit; there is no transaction spanning
/// calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List every record of a collection, including unmapped rows.
    ///
    /// Rows whose stored fields cannot be decoded are returned as
    /// unreadable instead of failing the whole listing.
    async fn list(&self, collection: &str) -> DomainResult<LoadedRows<LocalRecord>>;

    /// Insert a record and return its new local id.
    async fn insert(&self, collection: &str, record: &ExternalRecord) -> DomainResult<String>;

    /// Overwrite the fields of `local` with those of `desired`.
    async fn update(
        &self,
        collection: &str,
        local: &LocalRecord,
        desired: &ExternalRecord,
    ) -> DomainResult<()>;

    /// Delete a record.
    async fn delete(&self, collection: &str, local: &LocalRecord) -> DomainResult<()>;
}
