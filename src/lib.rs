//! Agencyflow - recurring tasks and portal reconciliation
//!
//! Agencyflow is the scheduling and synchronization backend of an agency
//! task-management system. It computes when recurring tasks fire next and
//! keeps locally stored records in step with external WordPress portals.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): The pure recurrence and reconciliation
//!   engines plus the services that drive them through ports
//! - **Adapters** (`adapters`): SQLite repositories and external record sources
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```
//! use agencyflow::domain::models::{ExternalRecord, SyncContext};
//! use agencyflow::services::reconcile;
//!
//! let desired = vec![ExternalRecord::new("A"), ExternalRecord::new("B")];
//! let plan = reconcile(&desired, &[], &SyncContext::new("tickets"));
//! assert_eq!(plan.to_insert.len(), 2);
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, CrossReferenceMap, DuplicatePolicy, ExternalRecord, LocalRecord, ReconciliationPlan,
    RecurrenceKind, RecurrenceRule, RecurringTask, RecurringTaskStatus, SyncContext, SyncSummary,
};
pub use domain::ports::{CrossReferenceRepository, ExternalSource, RecordStore, RecurringTaskRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{compute_next_occurrence, reconcile, RecurrenceService, SyncService};
