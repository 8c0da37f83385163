pub mod config;
pub mod loaded_rows;
pub mod recurrence;
pub mod sync_context;
pub mod sync_record;
pub mod sync_summary;

pub use config::{
    Config, DatabaseConfig, LoggingConfig, PortalConfig, RetryConfig, SyncConfig,
};
pub use loaded_rows::{LoadedRows, UnreadableRow};
pub use recurrence::{RecurrenceKind, RecurrenceRule, RecurringTask, RecurringTaskStatus};
pub use sync_context::{CrossReferenceMap, DuplicatePolicy, ReferenceField, SyncContext};
pub use sync_record::{value_as_key, ExternalRecord, Fields, LocalRecord};
pub use sync_summary::{
    ReconciliationPlan, RecordError, SyncAction, SyncSummary, UnresolvedReference,
};
