//! Adaptation-day resolution: which program day "today" is for a user.
//!
//! The program counts working days from the employee's start date. Weekends
//! are not program days, and every skipped day shifts the index back by one.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Textual form of start dates as they are stored on profiles.
pub const START_DATE_FORMAT: &str = "%d.%m.%Y";

/// Why no adaptation day applies right now.
///
/// These are expected outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// The profile carries no start date.
    NoStartDate,
    /// Today is a Saturday or Sunday.
    WeekendToday,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStartDate => write!(f, "No start date on file"),
            Self::WeekendToday => write!(f, "Today is a day off"),
        }
    }
}

/// Outcome of resolving the current day, in a form ready to hand outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// A program day applies. It may be non-positive or past the end of the
    /// program, in which case it simply has no tasks.
    Day { day: i64 },
    /// No program day applies today.
    NotApplicable { reason: Reason },
}

impl From<Result<i64, Reason>> for Resolution {
    fn from(result: Result<i64, Reason>) -> Self {
        match result {
            Ok(day) => Self::Day { day },
            Err(reason) => Self::NotApplicable { reason },
        }
    }
}

/// Whether the date falls on Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Count Saturdays and Sundays in the closed interval `[start, end]`.
///
/// Returns 0 when `end` precedes `start`.
pub fn count_weekends(start: NaiveDate, end: NaiveDate) -> i64 {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekend(*d))
        .count() as i64
}

/// Calendar days from `start` to `today`, counting the start date itself.
pub fn elapsed_calendar_days(start: NaiveDate, today: NaiveDate) -> i64 {
    (today - start).num_days() + 1
}

/// Working days from `start` to `today` inclusive, ignoring skips.
pub fn working_days_elapsed(start: NaiveDate, today: NaiveDate) -> i64 {
    elapsed_calendar_days(start, today) - count_weekends(start, today)
}

/// Resolve the adaptation day for `today`.
///
/// The result is not range-checked: a non-positive index or one beyond the
/// program means "no tasks defined", not an error.
pub fn resolve(
    start_date: Option<NaiveDate>,
    skipped_days: u32,
    today: NaiveDate,
) -> Result<i64, Reason> {
    let start = start_date.ok_or(Reason::NoStartDate)?;
    if is_weekend(today) {
        return Err(Reason::WeekendToday);
    }
    Ok(working_days_elapsed(start, today) - i64::from(skipped_days))
}

/// Parse a stored `DD.MM.YYYY` start date.
pub fn parse_start_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), START_DATE_FORMAT).ok()
}

/// Format a date the way profiles store it.
pub fn format_start_date(date: NaiveDate) -> String {
    date.format(START_DATE_FORMAT).to_string()
}
