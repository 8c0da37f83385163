//! Portal reconciliation CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sources::{JsonFileSource, WordPressSource};
use crate::adapters::sqlite::{SqliteCrossReferenceRepository, SqliteRecordStore};
use crate::cli::commands::open_database;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{
    Config, CrossReferenceMap, DuplicatePolicy, ReferenceField, SyncContext, SyncSummary,
};
use crate::domain::ports::{CrossReferenceRepository, ExternalSource};
use crate::services::SyncService;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Reconcile a configured portal into its local collection
    Run {
        /// Portal name from the sync.portals config section
        #[arg(long)]
        portal: String,

        /// Compute and report the plan without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile a collection against a JSON record file
    File {
        /// Local collection to reconcile into
        #[arg(long)]
        collection: String,

        /// Path to a JSON array of {"external_id", "fields"} objects
        #[arg(long)]
        path: PathBuf,

        /// Resolve a field through a cross-reference table (field=table)
        #[arg(long = "reference", value_parser = parse_reference)]
        references: Vec<ReferenceField>,

        /// Compute and report the plan without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// List configured portals
    Portals,
}

fn parse_reference(raw: &str) -> Result<ReferenceField, String> {
    match raw.split_once('=') {
        Some((field, table)) if !field.trim().is_empty() && !table.trim().is_empty() => {
            Ok(ReferenceField::new(field.trim(), table.trim()))
        }
        _ => Err(format!("expected field=table, got '{raw}'")),
    }
}

// -- Output structs --

#[derive(Debug, serde::Serialize)]
pub struct SyncOutput {
    #[serde(flatten)]
    pub summary: SyncSummary,
}

impl CommandOutput for SyncOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mode = if s.dry_run { " (dry run)" } else { "" };
        let mut lines = vec![
            format!("Synced '{}' from {}{}", s.collection, s.source, mode),
            format!("  fetched:    {}", s.fetched),
            format!("  inserted:   {}", s.inserted),
            format!("  updated:    {}", s.updated),
            format!("  deleted:    {}", s.deleted),
            format!("  unchanged:  {}", s.unchanged),
            format!("  skipped:    {}", s.skipped),
            format!("  failed:     {}", s.failed),
        ];
        if s.duplicates_dropped > 0 {
            lines.push(format!("  duplicate ids dropped: {}", s.duplicates_dropped));
        }
        if s.unreadable_rows > 0 {
            lines.push(format!("  unreadable local rows left untouched: {}", s.unreadable_rows));
        }
        if s.unresolved_references > 0 {
            lines.push(format!("  unresolved references cleared: {}", s.unresolved_references));
        }
        for err in &s.errors {
            let id = err
                .external_id
                .as_deref()
                .or(err.local_id.as_deref())
                .unwrap_or("?");
            lines.push(format!("  {} {} failed: {}", err.action.as_str(), id, truncate(&err.message, 80)));
        }
        lines.push(format!("  took {} ms", s.duration_ms()));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PortalListOutput {
    pub portals: Vec<PortalSummary>,
}

#[derive(Debug, serde::Serialize)]
pub struct PortalSummary {
    pub name: String,
    pub url: String,
    pub collection: String,
}

impl CommandOutput for PortalListOutput {
    fn to_human(&self) -> String {
        if self.portals.is_empty() {
            return "No portals configured. Add entries under sync.portals in .agencyflow/config.yaml.".to_string();
        }
        let mut lines = vec![format!("{:<16} {:<16} {}", "NAME", "COLLECTION", "URL"), "-".repeat(72)];
        for p in &self.portals {
            lines.push(format!("{:<16} {:<16} {}", truncate(&p.name, 15), truncate(&p.collection, 15), p.url));
        }
        lines.join("\n")
    }
}

// -- Execute --

pub async fn execute(args: SyncArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        SyncCommands::Portals => {
            let out = PortalListOutput {
                portals: config
                    .sync
                    .portals
                    .iter()
                    .map(|p| PortalSummary {
                        name: p.name.clone(),
                        url: format!("{}/wp-json/{}", p.base_url.trim_end_matches('/'), p.endpoint.trim_matches('/')),
                        collection: p.collection.clone(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }

        SyncCommands::Run { portal, dry_run } => {
            let portal = config
                .portal(&portal)
                .with_context(|| format!("Portal not configured: {portal}"))?
                .clone();
            let collection = portal.collection.clone();
            let references = portal.reference_fields.clone();
            let source = WordPressSource::new(portal, config.retry.clone())?;

            let summary = run_pass(config, &source, collection, references, dry_run).await?;
            output(&SyncOutput { summary }, json_mode);
        }

        SyncCommands::File { collection, path, references, dry_run } => {
            let source = JsonFileSource::new(path);
            let summary = run_pass(config, &source, collection, references, dry_run).await?;
            output(&SyncOutput { summary }, json_mode);
        }
    }

    Ok(())
}

async fn run_pass(
    config: &Config,
    source: &dyn ExternalSource,
    collection: String,
    references: Vec<ReferenceField>,
    dry_run: bool,
) -> Result<SyncSummary> {
    let pool = open_database(config).await?;
    let xrefs = SqliteCrossReferenceRepository::new(pool.clone());
    let ctx = build_context(&xrefs, collection, references, config.sync.duplicate_policy).await?;

    let service = SyncService::new(Arc::new(SqliteRecordStore::new(pool)));
    let summary = service
        .run(source, &ctx, dry_run)
        .await
        .with_context(|| format!("Sync of '{}' from {} failed", ctx.collection, source.name()))?;
    Ok(summary)
}

/// Assemble the per-pass context, loading only the tables the reference
/// fields point at.
pub async fn build_context(
    xrefs: &dyn CrossReferenceRepository,
    collection: String,
    references: Vec<ReferenceField>,
    policy: DuplicatePolicy,
) -> Result<SyncContext> {
    let mut tables: Vec<String> = references.iter().map(|r| r.table.clone()).collect();
    tables.sort();
    tables.dedup();

    let cross_refs = if tables.is_empty() {
        CrossReferenceMap::new()
    } else {
        xrefs.load(&tables).await.context("Failed to load cross-reference tables")?
    };

    let mut ctx = SyncContext::new(collection)
        .with_cross_refs(cross_refs)
        .with_duplicate_policy(policy);
    ctx.reference_fields = references;
    Ok(ctx)
}
