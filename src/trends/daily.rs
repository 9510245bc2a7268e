//! Daily calculations
//!
//! Date keys, per-day values and single-day records.

use chrono::{Duration as ChronoDuration, NaiveDate};

use super::{DayLabel, DayValue, RoundProgress};
use crate::models::day_record::read_day_total;
use crate::models::History;

/// Parse a date string in YYYY-MM-DD format
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

/// Format a date as its YYYY-MM-DD history key
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The calendar day before `date`
pub fn yesterday(date: NaiveDate) -> NaiveDate {
    date - ChronoDuration::days(1)
}

/// Every date in `[start, end]`, in order. Empty when `end < start`.
pub fn each_day(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Value of `phrase` (or the aggregate, with `None`) for each date in the range
pub fn per_day_values(
    history: &History,
    phrase: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
    label: DayLabel,
) -> Vec<DayValue> {
    each_day(start, end)
        .map(|day| {
            let key = date_key(day);
            let value = read_day_total(history.get(&key), phrase);
            DayValue {
                label: label.render(day),
                date: key,
                value,
            }
        })
        .collect()
}

/// Highest aggregate single-day total anywhere in the history
///
/// Legacy days contribute their raw number. Returns 0 for an empty history.
pub fn highest_day_total(history: &History) -> u64 {
    history
        .values()
        .map(|record| read_day_total(Some(record), None))
        .max()
        .unwrap_or(0)
}

/// Split a day's count into completed rounds and progress in the current one
pub fn round_progress(count: u64, goal: u32) -> RoundProgress {
    let goal = u64::from(goal.max(1));
    let current_round_progress = count % goal;

    RoundProgress {
        count,
        goal,
        rounds_completed: count / goal,
        current_round_progress,
        percent: (current_round_progress as f64 / goal as f64) * 100.0,
    }
}
