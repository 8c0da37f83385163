use serde::{Deserialize, Serialize};

use super::sync_context::{DuplicatePolicy, ReferenceField};

/// Main configuration structure for agencyflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retry policy for portal fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Portal synchronization configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Look up a configured portal by name.
    pub fn portal(&self, name: &str) -> Option<&PortalConfig> {
        self.sync.portals.iter().find(|p| p.name == name)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".agencyflow/agencyflow.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Portal synchronization configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Which record wins when a feed repeats an external id
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// External portals available to `sync run`
    #[serde(default)]
    pub portals: Vec<PortalConfig>,
}

/// One WordPress-based portal feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PortalConfig {
    /// Portal name used on the command line
    pub name: String,

    /// Site root, e.g. `https://portal.example.com`
    pub base_url: String,

    /// REST route below `/wp-json/`, e.g. `wp/v2/tickets`
    pub endpoint: String,

    /// Local collection the records are reconciled into
    pub collection: String,

    /// Page size requested from the portal
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Upper bound on pages fetched in one pass
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Item attribute holding the external id
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Item attributes copied into record fields; all when empty
    #[serde(default)]
    pub fields: Vec<String>,

    /// Fields resolved through cross-reference tables
    #[serde(default)]
    pub reference_fields: Vec<ReferenceField>,

    /// Environment variable holding a bearer token, if the portal needs one
    #[serde(default)]
    pub api_token_env: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_per_page() -> u32 {
    100
}

const fn default_max_pages() -> u32 {
    50
}

fn default_id_field() -> String {
    "id".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl PortalConfig {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        endpoint: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            collection: collection.into(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            id_field: default_id_field(),
            fields: Vec::new(),
            reference_fields: Vec::new(),
            api_token_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}
