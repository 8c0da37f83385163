//! Recurrence rule and recurring task domain models.
//!
//! A [`RecurrenceRule`] describes how a recurring task repeats. A
//! [`RecurringTask`] is the persisted template that carries the rule plus
//! the bookkeeping the scheduler needs (next/last occurrence, fire count).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// How often a recurring task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Any rule name this build does not know. Occurrences never advance.
    #[serde(other)]
    Unrecognized,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Parse a rule name. Unknown names map to [`RecurrenceKind::Unrecognized`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" | "annually" => Self::Yearly,
            _ => Self::Unrecognized,
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_interval() -> u32 {
    1
}

/// Any JSON integer, clamped into `1..=u32::MAX`.
fn lenient_interval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(u32::try_from(raw.max(1)).unwrap_or(u32::MAX))
}

/// Any list of JSON integers; values outside 0-6 are dropped.
fn lenient_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<u8>, D::Error> {
    let raw = Vec::<i64>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|day| u8::try_from(day).ok())
        .filter(|day| *day <= 6)
        .collect())
}

/// An optional JSON integer; values that do not fit a `u32` become `None`.
fn lenient_ordinal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| u32::try_from(value).ok()))
}

/// A recurrence rule.
///
/// Optional fields are only consulted for the kinds that use them:
/// `days_of_week` for weekly, `day_of_month` for monthly and yearly,
/// `month` for yearly. Out-of-range values are ignored rather than
/// rejected, so any deserialized rule can be evaluated. Deserialization
/// accepts any JSON integer for the numeric fields: intervals clamp to at
/// least one, negative days and months are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(rename = "rule")]
    pub kind: RecurrenceKind,

    /// Step size in units of the rule. Zero is treated as one.
    #[serde(default = "default_interval", deserialize_with = "lenient_interval")]
    pub interval: u32,

    /// Weekday numbers, 0 = Sunday through 6 = Saturday.
    #[serde(
        default,
        deserialize_with = "lenient_days",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub days_of_week: BTreeSet<u8>,

    /// Day of month, 1-31.
    #[serde(
        default,
        deserialize_with = "lenient_ordinal",
        skip_serializing_if = "Option::is_none"
    )]
    pub day_of_month: Option<u32>,

    /// Month, 1-12.
    #[serde(
        default,
        deserialize_with = "lenient_ordinal",
        skip_serializing_if = "Option::is_none"
    )]
    pub month: Option<u32>,
}

impl RecurrenceRule {
    pub fn new(kind: RecurrenceKind) -> Self {
        Self {
            kind,
            interval: 1,
            days_of_week: BTreeSet::new(),
            day_of_month: None,
            month: None,
        }
    }

    pub fn daily() -> Self {
        Self::new(RecurrenceKind::Daily)
    }

    pub fn weekly() -> Self {
        Self::new(RecurrenceKind::Weekly)
    }

    pub fn monthly() -> Self {
        Self::new(RecurrenceKind::Monthly)
    }

    pub fn yearly() -> Self {
        Self::new(RecurrenceKind::Yearly)
    }

    // Builder methods
    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    pub fn on_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn in_month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    /// Interval with the `0 -> 1` fallback applied.
    pub fn effective_interval(&self) -> u32 {
        self.interval.max(1)
    }

    /// Listed weekdays that are in range, ascending.
    pub fn valid_days_of_week(&self) -> Vec<u32> {
        self.days_of_week
            .iter()
            .filter(|d| **d <= 6)
            .map(|d| u32::from(*d))
            .collect()
    }

    /// `day_of_month` if it is within 1-31.
    pub fn valid_day_of_month(&self) -> Option<u32> {
        self.day_of_month.filter(|d| (1..=31).contains(d))
    }

    /// `month` if it is within 1-12.
    pub fn valid_month(&self) -> Option<u32> {
        self.month.filter(|m| (1..=12).contains(m))
    }

    /// Human-readable description of the rule.
    pub fn description(&self) -> String {
        let n = self.effective_interval();
        match self.kind {
            RecurrenceKind::Daily => {
                if n == 1 {
                    "every day".to_string()
                } else {
                    format!("every {n} days")
                }
            }
            RecurrenceKind::Weekly => {
                let base = if n == 1 {
                    "every week".to_string()
                } else {
                    format!("every {n} weeks")
                };
                let days = self.valid_days_of_week();
                if days.is_empty() {
                    base
                } else {
                    let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
                    format!("{base} on {}", names.join(", "))
                }
            }
            RecurrenceKind::Monthly => {
                let base = if n == 1 {
                    "every month".to_string()
                } else {
                    format!("every {n} months")
                };
                match self.valid_day_of_month() {
                    Some(day) => format!("{base} on day {day}"),
                    None => base,
                }
            }
            RecurrenceKind::Yearly => {
                let base = if n == 1 {
                    "every year".to_string()
                } else {
                    format!("every {n} years")
                };
                match (self.valid_month(), self.valid_day_of_month()) {
                    (Some(month), Some(day)) => format!("{base} on {month:02}-{day:02}"),
                    _ => base,
                }
            }
            RecurrenceKind::Unrecognized => "unrecognized rule".to_string(),
        }
    }
}

fn weekday_name(day: u32) -> &'static str {
    match day {
        0 => "Sun",
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        _ => "Sat",
    }
}

/// Status of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringTaskStatus {
    /// Occurrences are generated when due.
    Active,
    /// Skipped by the scheduler until resumed.
    Paused,
}

impl RecurringTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// A persisted recurring task template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub rule: RecurrenceRule,
    pub status: RecurringTaskStatus,

    // -- Tracking --
    /// When the next occurrence is due. `None` until seeded.
    pub next_occurrence: Option<DateTime<Utc>>,
    /// The most recent occurrence that fired.
    pub last_occurrence: Option<DateTime<Utc>>,
    /// Number of occurrences fired so far.
    pub occurrence_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTask {
    pub fn new(title: impl Into<String>, rule: RecurrenceRule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            rule,
            status: RecurringTaskStatus::Active,
            next_occurrence: None,
            last_occurrence: None,
            occurrence_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn starting_at(mut self, first: DateTime<Utc>) -> Self {
        self.next_occurrence = Some(first);
        self
    }

    /// Whether the task has an occurrence due at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RecurringTaskStatus::Active
            && self.next_occurrence.is_some_and(|next| next <= now)
    }
}
