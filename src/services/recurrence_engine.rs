//! Occurrence computation for recurring tasks.
//!
//! Every function here is pure: it takes the previous occurrence (or a
//! reference date) and returns a new value without touching the clock.
//!
//! # Invariants
//! - `compute_next_occurrence` is total. It never panics for any rule,
//!   and returns the input unchanged when the rule is unrecognized or the
//!   result would overflow the calendar.
//! - The time of day of the input is preserved.
//! - Monthly rules without a day of month, and yearly rules without both a
//!   month and a day, keep the input's day and clamp to the last day of a
//!   shorter target month (Jan 31 + 1 month is Feb 29 in a leap year). The
//!   clamped day carries forward: the occurrence after Feb 29 is Mar 29.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};

use crate::domain::models::{RecurrenceKind, RecurrenceRule};

/// Compute the occurrence that follows `current` under `rule`.
pub fn compute_next_occurrence(current: DateTime<Utc>, rule: &RecurrenceRule) -> DateTime<Utc> {
    let interval = rule.effective_interval();
    let next = match rule.kind {
        RecurrenceKind::Daily => add_days(current, u64::from(interval)),
        RecurrenceKind::Weekly => next_weekly(current, rule, interval),
        RecurrenceKind::Monthly => next_monthly(current, rule, interval),
        RecurrenceKind::Yearly => next_yearly(current, rule, interval),
        RecurrenceKind::Unrecognized => None,
    };
    next.unwrap_or(current)
}

/// Iterator over successive occurrences strictly after a seed date.
///
/// Ends as soon as a step fails to move forward, so it is finite for
/// unrecognized rules.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    current: DateTime<Utc>,
    exhausted: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let next = compute_next_occurrence(self.current, self.rule);
        if next <= self.current {
            self.exhausted = true;
            return None;
        }
        self.current = next;
        Some(next)
    }
}

/// Occurrences following `seed`, in order.
pub fn occurrences(seed: DateTime<Utc>, rule: &RecurrenceRule) -> Occurrences<'_> {
    Occurrences {
        rule,
        current: seed,
        exhausted: false,
    }
}

/// Collect at most `limit` occurrences after `seed` that fall on or before
/// `until`.
pub fn occurrences_between(
    seed: DateTime<Utc>,
    rule: &RecurrenceRule,
    until: DateTime<Utc>,
    limit: usize,
) -> Vec<DateTime<Utc>> {
    occurrences(seed, rule)
        .take_while(|at| *at <= until)
        .take(limit)
        .collect()
}

/// Number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

fn add_days(date: DateTime<Utc>, days: u64) -> Option<DateTime<Utc>> {
    date.checked_add_days(Days::new(days))
}

fn next_weekly(current: DateTime<Utc>, rule: &RecurrenceRule, interval: u32) -> Option<DateTime<Utc>> {
    let days = rule.valid_days_of_week();
    let Some(&first) = days.first() else {
        return add_days(current, 7 * u64::from(interval));
    };

    let today = current.weekday().num_days_from_sunday();
    if let Some(&later) = days.iter().find(|day| **day > today) {
        return add_days(current, u64::from(later - today));
    }

    // Wrap into the next cycle. A zero gap means the only listed day is
    // today, which steps a full week.
    let gap = match (7 - today + first) % 7 {
        0 => 7,
        gap => gap,
    };
    add_days(current, u64::from(gap) + 7 * u64::from(interval - 1))
}

fn next_monthly(current: DateTime<Utc>, rule: &RecurrenceRule, interval: u32) -> Option<DateTime<Utc>> {
    match rule.valid_day_of_month() {
        Some(day) => {
            let (year, month) = shift_months(current, interval)?;
            at_clamped_day(current, year, month, day)
        }
        None => current.checked_add_months(Months::new(interval)),
    }
}

fn next_yearly(current: DateTime<Utc>, rule: &RecurrenceRule, interval: u32) -> Option<DateTime<Utc>> {
    match (rule.valid_month(), rule.valid_day_of_month()) {
        (Some(month), Some(day)) => {
            let year = current.year().checked_add(i32::try_from(interval).ok()?)?;
            at_clamped_day(current, year, month, day)
        }
        _ => current.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

/// Year and month `months` after the month of `current`.
fn shift_months(current: DateTime<Utc>, months: u32) -> Option<(i32, u32)> {
    let total = i64::from(current.year()) * 12 + i64::from(current.month0()) + i64::from(months);
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

/// `current`'s time of day on `year-month-day`, with `day` clamped to the
/// month's length.
fn at_clamped_day(current: DateTime<Utc>, year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    let day = day.min(days_in_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_time(current.time()).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_daily_adds_interval_days() {
        for interval in 1..=40 {
            let rule = RecurrenceRule::daily().every(interval);
            let start = at(2024, 1, 15);
            let next = compute_next_occurrence(start, &rule);
            assert_eq!((next - start).num_days(), i64::from(interval));
        }
    }

    #[test]
    fn test_zero_interval_behaves_as_one() {
        let rule = RecurrenceRule::daily().every(0);
        assert_eq!(compute_next_occurrence(at(2024, 3, 1), &rule), at(2024, 3, 2));
    }

    #[test]
    fn test_weekly_without_days_adds_weeks() {
        let rule = RecurrenceRule::weekly().every(3);
        assert_eq!(compute_next_occurrence(at(2024, 1, 1), &rule), at(2024, 1, 22));
    }

    #[test]
    fn test_weekly_monday_to_wednesday() {
        // 2024-01-01 is a Monday.
        let start = at(2024, 1, 1);
        assert_eq!(start.weekday(), Weekday::Mon);
        let rule = RecurrenceRule::weekly().on_days([1, 3, 5]);
        let next = compute_next_occurrence(start, &rule);
        assert_eq!(next, at(2024, 1, 3));
        assert_eq!(next.weekday(), Weekday::Wed);
    }

    #[test]
    fn test_weekly_friday_wraps_to_next_monday() {
        let friday = at(2024, 1, 5);
        assert_eq!(friday.weekday(), Weekday::Fri);
        let rule = RecurrenceRule::weekly().on_days([1, 3, 5]);
        assert_eq!(compute_next_occurrence(friday, &rule), at(2024, 1, 8));
    }

    #[test]
    fn test_weekly_friday_interval_two_skips_a_week() {
        let friday = at(2024, 1, 5);
        let rule = RecurrenceRule::weekly().every(2).on_days([1, 3, 5]);
        assert_eq!(compute_next_occurrence(friday, &rule), at(2024, 1, 15));
    }

    #[test]
    fn test_weekly_single_day_equal_to_today_steps_full_cycle() {
        let monday = at(2024, 1, 1);
        let rule = RecurrenceRule::weekly().on_days([1]);
        assert_eq!(compute_next_occurrence(monday, &rule), at(2024, 1, 8));

        let every_other = RecurrenceRule::weekly().every(2).on_days([1]);
        assert_eq!(compute_next_occurrence(monday, &every_other), at(2024, 1, 15));
    }

    #[test]
    fn test_weekly_from_unlisted_day() {
        // Saturday -> Monday, Sunday (0) is not listed.
        let saturday = at(2024, 1, 6);
        let rule = RecurrenceRule::weekly().on_days([1, 3]);
        assert_eq!(compute_next_occurrence(saturday, &rule), at(2024, 1, 8));

        // Sunday is the smallest weekday number and sits in the current week.
        let rule = RecurrenceRule::weekly().on_days([0]);
        assert_eq!(compute_next_occurrence(saturday, &rule), at(2024, 1, 7));
    }

    #[test]
    fn test_weekly_ignores_out_of_range_days() {
        let monday = at(2024, 1, 1);
        let rule = RecurrenceRule::weekly().on_days([8, 9]);
        assert_eq!(compute_next_occurrence(monday, &rule), at(2024, 1, 8));
    }

    #[test]
    fn test_monthly_day_31_clamps_in_30_day_month() {
        let rule = RecurrenceRule::monthly().on_day_of_month(31);
        // March -> April (30 days).
        assert_eq!(compute_next_occurrence(at(2024, 3, 31), &rule), at(2024, 4, 30));
        // April -> May restores day 31.
        assert_eq!(compute_next_occurrence(at(2024, 4, 30), &rule), at(2024, 5, 31));
    }

    #[test]
    fn test_monthly_day_clamps_in_february() {
        let rule = RecurrenceRule::monthly().on_day_of_month(30);
        assert_eq!(compute_next_occurrence(at(2023, 1, 30), &rule), at(2023, 2, 28));
        assert_eq!(compute_next_occurrence(at(2024, 1, 30), &rule), at(2024, 2, 29));
    }

    #[test]
    fn test_monthly_crosses_year_boundary() {
        let rule = RecurrenceRule::monthly().every(3).on_day_of_month(15);
        assert_eq!(compute_next_occurrence(at(2024, 11, 15), &rule), at(2025, 2, 15));
    }

    #[test]
    fn test_monthly_without_day_keeps_day_of_month() {
        let rule = RecurrenceRule::monthly().every(2);
        assert_eq!(compute_next_occurrence(at(2024, 1, 10), &rule), at(2024, 3, 10));
        // Calendar clamps rather than rolling into the following month.
        let rule = RecurrenceRule::monthly();
        assert_eq!(compute_next_occurrence(at(2024, 1, 31), &rule), at(2024, 2, 29));
        assert_eq!(compute_next_occurrence(at(2024, 2, 29), &rule), at(2024, 3, 29));
        assert_eq!(compute_next_occurrence(at(2023, 1, 31), &rule), at(2023, 2, 28));
    }

    #[test]
    fn test_yearly_feb_29_clamps_in_non_leap_year() {
        let rule = RecurrenceRule::yearly().in_month(2).on_day_of_month(29);
        assert_eq!(compute_next_occurrence(at(2024, 2, 29), &rule), at(2025, 2, 28));
        assert_eq!(
            compute_next_occurrence(at(2024, 2, 29), &rule.clone().every(4)),
            at(2028, 2, 29)
        );
    }

    #[test]
    fn test_yearly_sets_month_and_day() {
        let rule = RecurrenceRule::yearly().in_month(6).on_day_of_month(15);
        assert_eq!(compute_next_occurrence(at(2024, 1, 3), &rule), at(2025, 6, 15));
    }

    #[test]
    fn test_yearly_missing_month_keeps_date() {
        let rule = RecurrenceRule::yearly().on_day_of_month(15);
        assert_eq!(compute_next_occurrence(at(2024, 7, 4), &rule), at(2025, 7, 4));
        let rule = RecurrenceRule::yearly();
        assert_eq!(compute_next_occurrence(at(2024, 2, 29), &rule), at(2025, 2, 28));
    }

    #[test]
    fn test_unrecognized_rule_returns_input() {
        let rule = RecurrenceRule::new(RecurrenceKind::Unrecognized).every(5);
        let start = at(2024, 5, 5);
        assert_eq!(compute_next_occurrence(start, &rule), start);
    }

    #[test]
    fn test_overflow_returns_input() {
        let end = DateTime::<Utc>::MAX_UTC;
        assert_eq!(compute_next_occurrence(end, &RecurrenceRule::daily()), end);
        assert_eq!(compute_next_occurrence(end, &RecurrenceRule::yearly()), end);
    }

    #[test]
    fn test_time_of_day_is_preserved() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let rule = RecurrenceRule::monthly().on_day_of_month(31);
        let next = compute_next_occurrence(start, &rule);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_occurrences_iterates_mon_wed_fri() {
        let rule = RecurrenceRule::weekly().on_days([1, 3, 5]);
        let got: Vec<_> = occurrences(at(2024, 1, 1), &rule).take(4).collect();
        assert_eq!(got, vec![at(2024, 1, 3), at(2024, 1, 5), at(2024, 1, 8), at(2024, 1, 10)]);
    }

    #[test]
    fn test_occurrences_stop_for_unrecognized_rule() {
        let rule = RecurrenceRule::new(RecurrenceKind::Unrecognized);
        assert_eq!(occurrences(at(2024, 1, 1), &rule).count(), 0);
    }

    #[test]
    fn test_occurrences_between_respects_until_and_limit() {
        let rule = RecurrenceRule::daily();
        let got = occurrences_between(at(2024, 1, 1), &rule, at(2024, 1, 4), 10);
        assert_eq!(got, vec![at(2024, 1, 2), at(2024, 1, 3), at(2024, 1, 4)]);
        let got = occurrences_between(at(2024, 1, 1), &rule, at(2024, 12, 31), 2);
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }
}
