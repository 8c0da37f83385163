//! Port for fetching records from an external system.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ExternalRecord;

/// Supplies the desired record set for one reconciliation pass.
///
/// Parsing and pagination are the source's job. A failure here aborts the
/// pass as a whole; there is nothing to reconcile without input.
#[async_trait]
pub trait ExternalSource: Send + Sync {
    /// Name used in logs and summaries.
    fn name(&self) -> &str;

    /// Fetch the complete current record set.
    async fn fetch(&self) -> DomainResult<Vec<ExternalRecord>>;
}
