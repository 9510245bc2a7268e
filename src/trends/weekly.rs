//! Weekly calculations
//!
//! Week boundaries, the week chart and the streak screen's activity strip.

use chrono::{Datelike, NaiveDate};

use super::daily::{date_key, each_day};
use super::{aggregate_labeled, DayActivity, DayLabel, PeriodStats};
use crate::config::WeekStart;
use crate::models::day_record::read_day_total;
use crate::models::History;

/// First day of the week containing the given date
pub fn week_start(date: NaiveDate, starts_on: WeekStart) -> NaiveDate {
    let offset = match starts_on {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    date - chrono::Duration::days(offset as i64)
}

/// Last day of the week containing the given date
pub fn week_end(date: NaiveDate, starts_on: WeekStart) -> NaiveDate {
    week_start(date, starts_on) + chrono::Duration::days(6)
}

/// Move an anchor date by whole weeks
pub fn shift_weeks(date: NaiveDate, weeks: i64) -> NaiveDate {
    date + chrono::Duration::weeks(weeks)
}

/// Chart data for the week containing `anchor`
pub fn weekly_stats(
    history: &History,
    phrase: &str,
    anchor: NaiveDate,
    starts_on: WeekStart,
) -> PeriodStats {
    let start = week_start(anchor, starts_on);
    let end = week_end(anchor, starts_on);
    let label = format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"));

    aggregate_labeled(history, phrase, start, end, DayLabel::Weekday, label)
}

/// Activity flags for each date in `[week_start, week_end]`.
///
/// A day is active when its aggregate total across phrases is positive.
pub fn weekly_activity_flags(
    history: &History,
    week_start: NaiveDate,
    week_end: NaiveDate,
    today: NaiveDate,
) -> Vec<DayActivity> {
    each_day(week_start, week_end)
        .map(|day| {
            let key = date_key(day);
            DayActivity {
                has_activity: read_day_total(history.get(&key), None) > 0,
                is_future: day > today,
                is_today: day == today,
                date: key,
            }
        })
        .collect()
}
