//! WordPress REST API source.
//!
//! Pages through `GET {base_url}/wp-json/{endpoint}?page=N&per_page=M`
//! until the `X-WP-TotalPages` header (or a short page) says there is no
//! more, and turns every item into an [`ExternalRecord`]. Each page
//! request is retried with exponential backoff on network errors, 429 and
//! 5xx responses.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{value_as_key, ExternalRecord, Fields, PortalConfig, RetryConfig};
use crate::domain::ports::ExternalSource;

const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// One fetched page: its items plus the advertised page count, if any.
struct Page {
    items: Vec<Value>,
    total_pages: Option<u32>,
}

/// HTTP source for one configured portal.
#[derive(Debug, Clone)]
pub struct WordPressSource {
    http: Client,
    portal: PortalConfig,
    retry: RetryConfig,
    token: Option<String>,
}

impl WordPressSource {
    /// Build a source for `portal`, reading its bearer token from the
    /// environment variable named in `api_token_env`.
    pub fn new(portal: PortalConfig, retry: RetryConfig) -> DomainResult<Self> {
        let token = match portal.api_token_env.as_deref() {
            Some(var) => {
                let token = std::env::var(var).map_err(|_| {
                    DomainError::ValidationFailed(format!(
                        "portal '{}' expects a token in {var}, which is not set",
                        portal.name
                    ))
                })?;
                Some(token)
            }
            None => None,
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(portal.timeout_secs.max(1)))
            .user_agent(concat!("agencyflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::fetch_failed(&portal.name, format!("client setup failed: {e}")))?;

        Ok(Self {
            http,
            portal,
            retry,
            token,
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/wp-json/{}?page={}&per_page={}",
            self.portal.base_url.trim_end_matches('/'),
            self.portal.endpoint.trim_matches('/'),
            page,
            self.portal.per_page.max(1)
        )
    }

    async fn fetch_page(&self, page: u32) -> DomainResult<Page> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms.max(1)))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms.max(1)))
            .with_max_elapsed_time(None)
            .build();

        let url = self.page_url(page);
        let mut attempts = 0u32;

        backoff::future::retry(policy, || {
            attempts += 1;
            let attempt = attempts;
            let url = url.clone();
            async move {
                self.request_page(&url).await.map_err(|(err, transient)| {
                    if transient && attempt <= self.retry.max_retries {
                        warn!(portal = %self.portal.name, page, attempt, error = %err, "page fetch failed, retrying");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }

    /// Single attempt. The flag on the error says whether a retry may help.
    async fn request_page(&self, url: &str) -> Result<Page, (DomainError, bool)> {
        let name = &self.portal.name;
        let mut req = self.http.get(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            (DomainError::fetch_failed(name, format!("request to {url} failed: {e}")), true)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err((
                DomainError::fetch_failed(name, format!("{url} returned {status}: {body}")),
                transient,
            ));
        }

        let total_pages = resp
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let body: Value = resp.json().await.map_err(|e| {
            (DomainError::fetch_failed(name, format!("invalid JSON from {url}: {e}")), false)
        })?;

        match body {
            Value::Array(items) => Ok(Page { items, total_pages }),
            other => Err((
                DomainError::fetch_failed(
                    name,
                    format!("expected a JSON array from {url}, got {}", json_kind(&other)),
                ),
                false,
            )),
        }
    }

    /// Map one portal item to a record. Items without a usable id keep a
    /// blank id so the reconciliation pass counts them as rejected.
    fn item_to_record(&self, item: &Value) -> ExternalRecord {
        let Some(object) = item.as_object() else {
            return ExternalRecord::new("");
        };

        let external_id = object
            .get(&self.portal.id_field)
            .and_then(value_as_key)
            .unwrap_or_default();

        let mut fields = Fields::new();
        if self.portal.fields.is_empty() {
            for (key, value) in object {
                if key != &self.portal.id_field {
                    fields.insert(key.clone(), unwrap_rendered(value));
                }
            }
        } else {
            for key in &self.portal.fields {
                if let Some(value) = object.get(key) {
                    fields.insert(key.clone(), unwrap_rendered(value));
                }
            }
        }

        ExternalRecord {
            external_id,
            fields,
        }
    }
}

/// WordPress wraps HTML-bearing attributes as `{"rendered": ...}`.
fn unwrap_rendered(value: &Value) -> Value {
    match value.as_object() {
        Some(obj) if obj.len() <= 2 && obj.contains_key("rendered") => {
            obj.get("rendered").cloned().unwrap_or(Value::Null)
        }
        _ => value.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl ExternalSource for WordPressSource {
    fn name(&self) -> &str {
        &self.portal.name
    }

    async fn fetch(&self) -> DomainResult<Vec<ExternalRecord>> {
        let per_page = self.portal.per_page.max(1) as usize;
        let max_pages = self.portal.max_pages.max(1);
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let Page { items, total_pages } = self.fetch_page(page).await?;
            let count = items.len();
            debug!(portal = %self.portal.name, page, count, ?total_pages, "fetched page");
            records.extend(items.iter().map(|item| self.item_to_record(item)));

            let more = match total_pages {
                Some(total) => page < total,
                None => count >= per_page,
            };
            if !more || count == 0 {
                break;
            }
            if page >= max_pages {
                warn!(portal = %self.portal.name, max_pages, "page limit reached, remaining pages skipped");
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}
