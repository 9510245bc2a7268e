//! Monthly calculations
//!
//! Month boundaries, the month chart and the calendar tiles.

use chrono::{Datelike, Months, NaiveDate};

use super::daily::{date_key, each_day};
use super::{aggregate_labeled, CalendarDay, DayLabel, DayStatus, PeriodStats};
use crate::models::day_record::read_day_total;
use crate::models::History;

/// Get the month identifier (YYYY-MM) for a date
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Get the first day of the month for a date
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.day0() as i64)
}

/// Get the last day of the month for a date
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next_month| next_month.pred_opt())
        .unwrap_or(date)
}

/// Move an anchor date by whole months, clamping the day to the target month
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

/// Chart data for the month containing `anchor`
pub fn monthly_stats(history: &History, phrase: &str, anchor: NaiveDate) -> PeriodStats {
    let label = anchor.format("%B %Y").to_string();
    aggregate_labeled(
        history,
        phrase,
        month_start(anchor),
        month_end(anchor),
        DayLabel::DayOfMonth,
        label,
    )
}

/// Calendar tiles for the month containing `anchor`, classified by the
/// aggregate day total against the daily goal
pub fn month_calendar(history: &History, anchor: NaiveDate, daily_goal: u32) -> Vec<CalendarDay> {
    each_day(month_start(anchor), month_end(anchor))
        .map(|day| {
            let key = date_key(day);
            let total = read_day_total(history.get(&key), None);
            let status = if total > 0 && total >= u64::from(daily_goal) {
                DayStatus::GoalMet
            } else if total > 0 {
                DayStatus::Active
            } else {
                DayStatus::Empty
            };
            CalendarDay {
                date: key,
                total,
                status,
            }
        })
        .collect()
}
