//! Source that reads a pre-exported record set from a JSON file.
//!
//! The file holds an array of `{"external_id": ..., "fields": {...}}`
//! objects. Numeric ids are accepted and converted to their string form.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{value_as_key, ExternalRecord, Fields};
use crate::domain::ports::ExternalSource;

#[derive(Debug, Deserialize)]
struct FileRecord {
    #[serde(default)]
    external_id: Value,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { name, path }
    }

    fn parse(&self, contents: &str) -> DomainResult<Vec<ExternalRecord>> {
        let rows: Vec<FileRecord> = serde_json::from_str(contents)
            .map_err(|e| DomainError::fetch_failed(&self.name, format!("invalid record file: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| ExternalRecord {
                external_id: value_as_key(&row.external_id).unwrap_or_default(),
                fields: row.fields,
            })
            .collect())
    }
}

#[async_trait]
impl ExternalSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> DomainResult<Vec<ExternalRecord>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DomainError::fetch_failed(&self.name, format!("cannot read {}: {e}", self.path.display())))?;
        self.parse(&contents)
    }
}
