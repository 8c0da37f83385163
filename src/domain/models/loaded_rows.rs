//! Batch loads that tolerate individual undecodable rows.

use serde::Serialize;

use crate::domain::errors::DomainError;

/// A stored row that exists but could not be decoded into its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableRow {
    /// Primary key as stored. Not necessarily a valid id.
    pub id: String,
    pub external_id: Option<String>,
    pub reason: String,
}

/// Rows loaded in one query: the ones that decoded and the ones that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRows<T> {
    pub items: Vec<T>,
    pub unreadable: Vec<UnreadableRow>,
}

impl<T> Default for LoadedRows<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for LoadedRows<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            unreadable: Vec::new(),
        }
    }
}

impl<T> LoadedRows<T> {
    /// Keep a decoded row, or record why it could not be decoded.
    pub fn push(&mut self, id: String, external_id: Option<String>, decoded: Result<T, DomainError>) {
        match decoded {
            Ok(item) => self.items.push(item),
            Err(err) => self.unreadable.push(UnreadableRow {
                id,
                external_id,
                reason: err.to_string(),
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unreadable.is_empty()
    }
}
