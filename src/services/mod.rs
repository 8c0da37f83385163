//! Service layer: the pure engines and the services that drive them.

pub mod reconciliation_engine;
pub mod recurrence_engine;
pub mod recurrence_service;
pub mod sync_service;

pub use reconciliation_engine::reconcile;
pub use recurrence_engine::{compute_next_occurrence, occurrences, occurrences_between};
pub use recurrence_service::{AdvanceError, AdvanceSummary, FiredOccurrence, RecurrenceService};
pub use sync_service::{PreparedPass, SyncService};
