//! Records exchanged between an external portal and the local store.
//!
//! # Invariants
//! - `ExternalRecord::external_id` identifies the record within one source.
//! - A `LocalRecord` with `external_id == None` is an unmapped legacy row and
//!   is never matched against external data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Attribute map of a record. Keys are field names.
pub type Fields = Map<String, Value>;

/// A record fetched from an external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub external_id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl ExternalRecord {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// External id with surrounding whitespace removed.
    pub fn normalized_id(&self) -> &str {
        self.external_id.trim()
    }
}

/// A record persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Opaque store key.
    pub local_id: String,
    pub external_id: Option<String>,
    #[serde(default)]
    pub fields: Fields,
}

impl LocalRecord {
    pub fn new(local_id: impl Into<String>, external_id: Option<String>) -> Self {
        Self {
            local_id: local_id.into(),
            external_id,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Normalized external id, or `None` for unmapped rows (null or blank).
    pub fn normalized_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Convert a JSON scalar into the string form used as an external id key.
///
/// Portals are inconsistent about numeric vs. string ids (`42`, `42.0` and
/// `"42"`), so all of them collapse to the same key. Non-scalar values have
/// no key.
pub fn value_as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(number_key(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Integer text for whole numbers, including whole floats.
fn number_key(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
            #[allow(clippy::cast_possible_truncation)]
            let whole = f as i64;
            whole.to_string()
        }
        _ => n.to_string(),
    }
}
