use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project configuration and the default database.
pub const CONFIG_DIR: &str = ".agencyflow";

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "AGENCYFLOW_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Duplicate portal name: {0}")]
    DuplicatePortal(String),

    #[error("Invalid portal '{portal}': {reason}")]
    InvalidPortal { portal: String, reason: String },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .agencyflow/config.yaml (project config, created by init)
    /// 3. .agencyflow/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AGENCYFLOW_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`load`](Self::load), rooted at `root` instead of the
    /// working directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let mut seen = HashSet::new();
        for portal in &config.sync.portals {
            let invalid = |reason: &str| ConfigError::InvalidPortal {
                portal: portal.name.clone(),
                reason: reason.to_string(),
            };

            if portal.name.trim().is_empty() {
                return Err(invalid("name cannot be empty"));
            }
            if !seen.insert(portal.name.as_str()) {
                return Err(ConfigError::DuplicatePortal(portal.name.clone()));
            }
            if !portal.base_url.starts_with("http://") && !portal.base_url.starts_with("https://") {
                return Err(invalid("base_url must be an http(s) URL"));
            }
            if portal.endpoint.trim_matches('/').is_empty() {
                return Err(invalid("endpoint cannot be empty"));
            }
            if portal.collection.trim().is_empty() {
                return Err(invalid("collection cannot be empty"));
            }
            if portal.per_page == 0 || portal.max_pages == 0 {
                return Err(invalid("per_page and max_pages must be at least 1"));
            }
            if portal.reference_fields.iter().any(|r| r.field.is_empty() || r.table.is_empty()) {
                return Err(invalid("reference_fields need both field and table"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::PortalConfig;
    use crate::domain::models::DuplicatePolicy;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".agencyflow/agencyflow.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sync.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert!(config.sync.portals.is_empty());
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 3
logging:
  level: debug
  format: json
  retention_days: 7
sync:
  duplicate_policy: keep_last
  portals:
    - name: acme
      base_url: https://portal.acme.test
      endpoint: wp/v2/tickets
      collection: tickets
      fields: [title, status, website]
      reference_fields:
        - field: website
          table: websites
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.sync.duplicate_policy, DuplicatePolicy::KeepLast);

        let portal = config.portal("acme").expect("portal should exist");
        assert_eq!(portal.per_page, 100);
        assert_eq!(portal.id_field, "id");
        assert_eq!(portal.reference_fields[0].table, "websites");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(ref f) if f == "xml"
        ));
    }

    #[test]
    fn test_validate_database_settings() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_retry_settings() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxRetries(0)
        ));

        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBackoff(30000, 10000)
        ));
    }

    #[test]
    fn test_validate_portals() {
        let good = PortalConfig::new("acme", "https://acme.test", "wp/v2/tickets", "tickets");

        let mut config = Config::default();
        config.sync.portals = vec![good.clone(), good.clone()];
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::DuplicatePortal(ref n) if n == "acme"
        ));

        let mut bad_url = good.clone();
        bad_url.base_url = "ftp://acme.test".to_string();
        config.sync.portals = vec![bad_url];
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidPortal { .. }
        ));

        let mut no_pages = good.clone();
        no_pages.per_page = 0;
        config.sync.portals = vec![no_pages];
        assert!(ConfigLoader::validate(&config).is_err());

        config.sync.portals = vec![good];
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                ("AGENCYFLOW_LOGGING__LEVEL", Some("debug")),
                ("AGENCYFLOW_DATABASE__MAX_CONNECTIONS", Some("2")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.database.max_connections, 2);
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let mut base = std::fs::File::create(config_dir.join("config.yaml")).unwrap();
        writeln!(base, "logging:\n  level: info\n  format: json\nretry:\n  max_retries: 5").unwrap();

        let mut local = std::fs::File::create(config_dir.join("local.yaml")).unwrap();
        writeln!(local, "logging:\n  level: warn").unwrap();

        let config = temp_env::with_var_unset("AGENCYFLOW_LOGGING__LEVEL", || {
            ConfigLoader::load_from_dir(dir.path()).unwrap()
        });

        assert_eq!(config.logging.level, "warn", "Local override should win");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  format: xml").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
