//! Recurring task CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteRecurringTaskRepository;
use crate::cli::commands::open_database;
use crate::cli::output::{format_time, output, truncate, ActionOutput, CommandOutput};
use crate::domain::models::{Config, RecurrenceKind, RecurrenceRule, RecurringTask, RecurringTaskStatus};
use crate::domain::ports::RecurringTaskFilter;
use crate::services::recurrence_engine::occurrences;
use crate::services::{AdvanceSummary, RecurrenceService};

#[derive(Args, Debug)]
pub struct RecurArgs {
    #[command(subcommand)]
    pub command: RecurCommands,
}

/// Rule flags shared by `next` and `add`.
#[derive(Args, Debug, Clone)]
pub struct RuleArgs {
    /// Rule kind: daily, weekly, monthly, yearly
    #[arg(long)]
    pub rule: String,

    /// Step size in units of the rule
    #[arg(long, default_value_t = 1)]
    pub interval: u32,

    /// Weekdays for weekly rules, 0 = Sunday (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<u8>,

    /// Day of month for monthly and yearly rules
    #[arg(long)]
    pub day_of_month: Option<u32>,

    /// Month for yearly rules
    #[arg(long)]
    pub month: Option<u32>,
}

impl RuleArgs {
    pub fn to_rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            kind: RecurrenceKind::parse(&self.rule),
            interval: self.interval,
            days_of_week: self.days.iter().copied().collect(),
            day_of_month: self.day_of_month,
            month: self.month,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum RecurCommands {
    /// Compute upcoming occurrences of a rule without storing anything
    Next {
        #[command(flatten)]
        rule: RuleArgs,

        /// Reference date (RFC3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        from: Option<String>,

        /// Number of occurrences to show
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Create a recurring task
    Add {
        /// Task title
        #[arg(long)]
        title: String,

        /// Task description
        #[arg(long, default_value = "")]
        description: String,

        #[command(flatten)]
        rule: RuleArgs,

        /// First occurrence (RFC3339 or YYYY-MM-DD); computed from now when omitted
        #[arg(long)]
        start: Option<String>,
    },

    /// List recurring tasks
    List {
        /// Filter by status (active, paused)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a recurring task and its upcoming occurrences
    Show {
        /// Task ID or unique ID prefix
        id: String,

        /// Number of upcoming occurrences to show
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Pause a recurring task
    Pause {
        /// Task ID or unique ID prefix
        id: String,
    },

    /// Resume a paused recurring task
    Resume {
        /// Task ID or unique ID prefix
        id: String,
    },

    /// Delete a recurring task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },

    /// Fire every occurrence that is due now
    Run,
}

// -- Output structs --

#[derive(Debug, serde::Serialize)]
pub struct NextOutput {
    pub rule: RecurrenceRule,
    pub description: String,
    pub from: DateTime<Utc>,
    pub occurrences: Vec<DateTime<Utc>>,
}

impl CommandOutput for NextOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} from {}:",
            self.description,
            format_time(self.from)
        )];
        if self.occurrences.is_empty() {
            lines.push("  (rule does not produce further occurrences)".to_string());
        }
        for (i, at) in self.occurrences.iter().enumerate() {
            lines.push(format!("  {:>2}. {} ({})", i + 1, format_time(*at), at.format("%A")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecurringTaskOutput {
    pub id: String,
    pub title: String,
    pub rule: String,
    pub status: String,
    pub next_occurrence: Option<String>,
    pub last_occurrence: Option<String>,
    pub occurrence_count: u64,
}

impl From<&RecurringTask> for RecurringTaskOutput {
    fn from(t: &RecurringTask) -> Self {
        Self {
            id: t.id.to_string(),
            title: t.title.clone(),
            rule: t.rule.description(),
            status: t.status.as_str().to_string(),
            next_occurrence: t.next_occurrence.map(format_time),
            last_occurrence: t.last_occurrence.map(format_time),
            occurrence_count: t.occurrence_count,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecurringTaskListOutput {
    pub tasks: Vec<RecurringTaskOutput>,
    pub total: usize,
}

impl CommandOutput for RecurringTaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No recurring tasks found.".to_string();
        }

        let mut lines = vec![format!("Found {} recurring task(s):\n", self.total)];
        lines.push(format!(
            "{:<10} {:<24} {:<8} {:<26} {:<22} {:<6}",
            "ID", "TITLE", "STATUS", "RULE", "NEXT", "FIRED"
        ));
        lines.push("-".repeat(100));

        for t in &self.tasks {
            lines.push(format!(
                "{:<10} {:<24} {:<8} {:<26} {:<22} {:<6}",
                short_id(&t.id),
                truncate(&t.title, 22),
                t.status,
                truncate(&t.rule, 24),
                t.next_occurrence.as_deref().unwrap_or("-"),
                t.occurrence_count,
            ));
        }

        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecurringTaskDetailOutput {
    pub task: RecurringTaskOutput,
    pub description: String,
    pub upcoming: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CommandOutput for RecurringTaskDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Recurring task: {}", self.task.title),
            format!("ID: {}", self.task.id),
            format!("Status: {}", self.task.status),
            format!("Rule: {}", self.task.rule),
        ];
        if !self.description.is_empty() {
            lines.push(format!("Description: {}", truncate(&self.description, 80)));
        }
        lines.push(format!("Fired: {} time(s)", self.task.occurrence_count));
        if let Some(ref last) = self.task.last_occurrence {
            lines.push(format!("Last occurrence: {last}"));
        }
        if !self.upcoming.is_empty() {
            lines.push(String::new());
            lines.push("Upcoming:".to_string());
            for at in &self.upcoming {
                lines.push(format!("  - {at}"));
            }
        }
        lines.push(String::new());
        lines.push(format!("Created: {}", self.created_at));
        lines.push(format!("Updated: {}", self.updated_at));
        lines.join("\n")
    }
}

/// First eight characters of an id, or the whole id when shorter.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub summary: AdvanceSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        if s.due == 0 {
            return "No recurring tasks are due.".to_string();
        }
        let mut lines = vec![format!(
            "{} due, {} fired, {} missed occurrence(s) skipped, {} failed",
            s.due, s.advanced, s.missed, s.failed
        )];
        for fired in &s.fired {
            lines.push(format!(
                "  fired  {} '{}' (due {}, next {})",
                &fired.task_id.to_string()[..8],
                truncate(&fired.title, 30),
                format_time(fired.due_at),
                format_time(fired.next_occurrence),
            ));
        }
        for err in &s.errors {
            lines.push(format!("  failed {}: {}", short_id(&err.task_id), truncate(&err.message, 80)));
        }
        lines.join("\n")
    }
}

// -- Execute --

pub async fn execute(args: RecurArgs, config: &Config, json_mode: bool) -> Result<()> {
    if let RecurCommands::Next { rule, from, count } = &args.command {
        let from = match from {
            Some(raw) => parse_time(raw)?,
            None => Utc::now(),
        };
        let rule = rule.to_rule();
        let out = NextOutput {
            description: rule.description(),
            occurrences: occurrences(from, &rule).take(*count).collect(),
            from,
            rule,
        };
        output(&out, json_mode);
        return Ok(());
    }

    let pool = open_database(config).await?;
    let repo = Arc::new(SqliteRecurringTaskRepository::new(pool));
    let service = RecurrenceService::new(repo);

    match args.command {
        RecurCommands::Next { .. } => {}

        RecurCommands::Add { title, description, rule, start } => {
            let rule = rule.to_rule();
            if rule.kind == RecurrenceKind::Unrecognized {
                anyhow::bail!("Unknown rule '{}'. Use one of: daily, weekly, monthly, yearly", rule.kind);
            }
            let mut task = RecurringTask::new(title, rule).with_description(description);
            if let Some(raw) = start {
                task = task.starting_at(parse_time(&raw)?);
            }

            let task = service.create(task, Utc::now()).await?;
            let out = ActionOutput::ok(format!(
                "Created recurring task '{}' ({})\nID: {}\nNext occurrence: {}",
                task.title,
                task.rule.description(),
                task.id,
                task.next_occurrence.map_or_else(|| "-".to_string(), format_time),
            ));
            output(&out, json_mode);
        }

        RecurCommands::List { status } => {
            let status = match status {
                Some(s) => Some(
                    RecurringTaskStatus::from_str(&s)
                        .with_context(|| format!("Unknown status '{s}'. Use active or paused"))?,
                ),
                None => None,
            };
            let tasks = service.list(RecurringTaskFilter { status }).await?;
            let out = RecurringTaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(RecurringTaskOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        RecurCommands::Show { id, count } => {
            let task = find_task(&service, &id).await?;
            let upcoming = service.preview(task.id, count).await?;
            let out = RecurringTaskDetailOutput {
                task: RecurringTaskOutput::from(&task),
                description: task.description.clone(),
                upcoming: upcoming.into_iter().map(format_time).collect(),
                created_at: format_time(task.created_at),
                updated_at: format_time(task.updated_at),
            };
            output(&out, json_mode);
        }

        RecurCommands::Pause { id } => {
            let task = find_task(&service, &id).await?;
            let task = service.pause(task.id).await?;
            output(&ActionOutput::ok(format!("Recurring task paused: {}", task.title)), json_mode);
        }

        RecurCommands::Resume { id } => {
            let task = find_task(&service, &id).await?;
            let task = service.resume(task.id).await?;
            output(&ActionOutput::ok(format!("Recurring task resumed: {}", task.title)), json_mode);
        }

        RecurCommands::Delete { id } => {
            let task = find_task(&service, &id).await?;
            service.delete(task.id).await?;
            output(&ActionOutput::ok(format!("Recurring task deleted: {}", task.title)), json_mode);
        }

        RecurCommands::Run => {
            let summary = service.advance_due(Utc::now()).await?;
            output(&RunOutput { summary }, json_mode);
        }
    }

    Ok(())
}

/// Accept RFC3339 timestamps or bare dates (midnight UTC).
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{raw}'. Use RFC3339 or YYYY-MM-DD"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

async fn find_task(
    service: &RecurrenceService<SqliteRecurringTaskRepository>,
    id_or_prefix: &str,
) -> Result<RecurringTask> {
    if let Ok(id) = Uuid::parse_str(id_or_prefix) {
        return service
            .get(id)
            .await?
            .with_context(|| format!("Recurring task not found: {id_or_prefix}"));
    }

    let prefix = id_or_prefix.to_lowercase();
    let mut matches: Vec<RecurringTask> = service
        .list(RecurringTaskFilter::default())
        .await?
        .into_iter()
        .filter(|t| t.id.to_string().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("Recurring task not found: {id_or_prefix}"),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("ID prefix '{id_or_prefix}' is ambiguous ({n} matches)"),
    }
}
