//! CLI command implementations.

pub mod init;
pub mod recur;
pub mod sync;
pub mod xref;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::initialize_from_config;
use crate::domain::models::Config;

/// Open the configured database, applying pending migrations.
pub(crate) async fn open_database(config: &Config) -> Result<SqlitePool> {
    initialize_from_config(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}. Run 'agencyflow init' first.",
                config.database.path
            )
        })
}
