//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - `RecordStore`: persistence of synced records
//! - `ExternalSource`: fetching records from an external portal
//! - `CrossReferenceRepository`: external-id to local-id mappings
//! - `RecurringTaskRepository`: recurring task templates

pub mod cross_reference_repository;
pub mod external_source;
pub mod record_store;
pub mod recurring_task_repository;

pub use cross_reference_repository::{CrossReferenceEntry, CrossReferenceRepository};
pub use external_source::ExternalSource;
pub use record_store::RecordStore;
pub use recurring_task_repository::{RecurringTaskFilter, RecurringTaskRepository};
