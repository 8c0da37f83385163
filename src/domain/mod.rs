//! Domain layer for agencyflow
//!
//! Core models, the errors they raise, and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
