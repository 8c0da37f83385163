//! Cross-reference table CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::adapters::sqlite::SqliteCrossReferenceRepository;
use crate::cli::commands::open_database;
use crate::cli::output::{output, truncate, ActionOutput, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::{CrossReferenceEntry, CrossReferenceRepository};

#[derive(Args, Debug)]
pub struct XrefArgs {
    #[command(subcommand)]
    pub command: XrefCommands,
}

#[derive(Subcommand, Debug)]
pub enum XrefCommands {
    /// Map an external id to a local id
    Set {
        /// Table name, e.g. websites, operators, clients
        #[arg(long)]
        table: String,

        /// External id as the portal reports it
        #[arg(long)]
        external: String,

        /// Local id it resolves to
        #[arg(long)]
        local: String,
    },

    /// List mappings
    List {
        /// Restrict to one table
        #[arg(long)]
        table: Option<String>,
    },

    /// Remove a mapping
    Remove {
        #[arg(long)]
        table: String,

        #[arg(long)]
        external: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct XrefEntryOutput {
    pub table: String,
    pub external_id: String,
    pub local_id: String,
}

impl From<CrossReferenceEntry> for XrefEntryOutput {
    fn from(e: CrossReferenceEntry) -> Self {
        Self {
            table: e.table,
            external_id: e.external_id,
            local_id: e.local_id,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct XrefListOutput {
    pub entries: Vec<XrefEntryOutput>,
    pub total: usize,
}

impl CommandOutput for XrefListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No cross-references found.".to_string();
        }
        let mut lines = vec![
            format!("{:<16} {:<20} {}", "TABLE", "EXTERNAL ID", "LOCAL ID"),
            "-".repeat(72),
        ];
        for e in &self.entries {
            lines.push(format!(
                "{:<16} {:<20} {}",
                truncate(&e.table, 15),
                truncate(&e.external_id, 19),
                e.local_id
            ));
        }
        lines.push(format!("\n{} mapping(s)", self.total));
        lines.join("\n")
    }
}

pub async fn execute(args: XrefArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let repo = SqliteCrossReferenceRepository::new(pool);

    match args.command {
        XrefCommands::Set { table, external, local } => {
            let entry = CrossReferenceEntry {
                table,
                external_id: external,
                local_id: local,
            };
            repo.upsert(&entry).await?;
            let out = ActionOutput::ok(format!(
                "{}: {} -> {}",
                entry.table.trim(),
                entry.external_id.trim(),
                entry.local_id
            ));
            output(&out, json_mode);
        }

        XrefCommands::List { table } => {
            let entries = repo.list(table.as_deref()).await?;
            let out = XrefListOutput {
                total: entries.len(),
                entries: entries.into_iter().map(XrefEntryOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        XrefCommands::Remove { table, external } => {
            if !repo.remove(&table, &external).await? {
                anyhow::bail!("No mapping for {external} in table {table}");
            }
            output(&ActionOutput::ok(format!("Removed {table}: {external}")), json_mode);
        }
    }

    Ok(())
}
