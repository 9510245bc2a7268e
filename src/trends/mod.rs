//! Trend analysis module
//!
//! This module handles the read-only statistics over a profile's history:
//! - Per-day values and period totals/averages (week, month, any range)
//! - Best-ever single-day total
//! - Weekly activity flags and month calendar tiles

pub mod daily;
pub mod monthly;
pub mod weekly;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{History, Profile};

/// How each day of a period is labelled for charts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    /// `2024-01-07`
    DateKey,
    /// `Sun`
    Weekday,
    /// `7`
    DayOfMonth,
}

impl DayLabel {
    pub fn render(self, date: NaiveDate) -> String {
        match self {
            DayLabel::DateKey => daily::date_key(date),
            DayLabel::Weekday => date.format("%a").to_string(),
            DayLabel::DayOfMonth => date.format("%-d").to_string(),
        }
    }
}

/// A single day's value within a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayValue {
    /// Date in YYYY-MM-DD format
    pub date: String,
    pub label: String,
    pub value: u64,
}

/// Totals for a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    /// Display label for the whole period
    pub label: String,
    pub start: String,
    pub end: String,
    pub total: u64,
    /// `total / days`, rounded half-up
    pub average: u64,
    /// One entry per date, in date order
    pub days: Vec<DayValue>,
}

/// Activity marker for one day of the week strip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    pub date: String,
    pub has_activity: bool,
    pub is_future: bool,
    pub is_today: bool,
}

/// Calendar tile classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// Aggregate total reached the daily goal
    GoalMet,
    /// Some repetitions, below the goal
    Active,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub total: u64,
    pub status: DayStatus,
}

/// Progress of today's count through rounds of `goal` repetitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundProgress {
    pub count: u64,
    pub goal: u64,
    pub rounds_completed: u64,
    pub current_round_progress: u64,
    /// Percentage of the current round, 0..100
    pub percent: f64,
}

/// Everything the home and streak screens show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_phrase: String,
    pub streak: u32,
    pub max_streak: u32,
    /// Today's count for the active phrase
    pub today_count: u64,
    /// Today's count across all phrases
    pub today_total: u64,
    pub highest_day_total: u64,
    pub rounds: RoundProgress,
}

impl DashboardSummary {
    pub fn from_profile(profile: &Profile, active_phrase: &str, today: NaiveDate) -> Self {
        let today_count = profile.count_on(today, active_phrase);

        Self {
            active_phrase: active_phrase.to_string(),
            streak: profile.streak,
            max_streak: profile.max_streak,
            today_count,
            today_total: profile.total_on(today),
            highest_day_total: daily::highest_day_total(&profile.history),
            rounds: daily::round_progress(today_count, profile.effective_goal()),
        }
    }
}

/// Integer average rounded half-up
pub fn rounded_average(total: u64, days: usize) -> u64 {
    let days = days.max(1) as u128;
    let average = (u128::from(total) * 2 + days) / (days * 2);
    u64::try_from(average).unwrap_or(u64::MAX)
}

/// Period statistics for `phrase` over `[start, end]` inclusive.
///
/// Legacy-shaped days count 0 for a named phrase.
pub fn aggregate(history: &History, phrase: &str, start: NaiveDate, end: NaiveDate) -> PeriodStats {
    aggregate_labeled(
        history,
        phrase,
        start,
        end,
        DayLabel::DateKey,
        format!("{} - {}", daily::date_key(start), daily::date_key(end)),
    )
}

pub(crate) fn aggregate_labeled(
    history: &History,
    phrase: &str,
    start: NaiveDate,
    end: NaiveDate,
    day_label: DayLabel,
    label: String,
) -> PeriodStats {
    let days = daily::per_day_values(history, Some(phrase), start, end, day_label);
    let total = days.iter().fold(0u64, |sum, d| sum.saturating_add(d.value));

    PeriodStats {
        label,
        start: daily::date_key(start),
        end: daily::date_key(end),
        total,
        average: rounded_average(total, days.len()),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::DayRecord;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mixed_history() -> History {
        let mut history = History::new();
        history.insert(
            "2024-01-01".to_string(),
            DayRecord::ByPhrase(BTreeMap::from([("Om".to_string(), 10)])),
        );
        history.insert("2024-01-02".to_string(), DayRecord::Legacy(5));
        history
    }

    #[test]
    fn test_aggregate_skips_legacy_for_named_phrase() {
        let stats = aggregate(&mixed_history(), "Om", date(2024, 1, 1), date(2024, 1, 2));

        assert_eq!(stats.total, 10);
        assert_eq!(stats.average, 5);
        assert_eq!(stats.days.len(), 2);
        assert_eq!(stats.days[0].value, 10);
        assert_eq!(stats.days[1].value, 0);
        assert_eq!(stats.start, "2024-01-01");
        assert_eq!(stats.end, "2024-01-02");
    }

    #[test]
    fn test_aggregate_other_phrase_is_zero() {
        let stats = aggregate(&mixed_history(), "Hare Krishna", date(2024, 1, 1), date(2024, 1, 7));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average, 0);
        assert_eq!(stats.days.len(), 7);
    }

    #[test]
    fn test_rounded_average_half_up() {
        assert_eq!(rounded_average(10, 2), 5);
        assert_eq!(rounded_average(10, 4), 3); // 2.5
        assert_eq!(rounded_average(10, 3), 3); // 3.33
        assert_eq!(rounded_average(11, 3), 4); // 3.67
        assert_eq!(rounded_average(0, 7), 0);
        assert_eq!(rounded_average(5, 0), 5);
    }

    #[test]
    fn test_rounded_average_near_max() {
        assert_eq!(rounded_average(u64::MAX, 1), u64::MAX);
        assert_eq!(rounded_average(u64::MAX, 2), 1 << 63);
    }

    #[test]
    fn test_aggregate_saturates_total() {
        let mut history = History::new();
        for day in ["2024-01-01", "2024-01-02"] {
            history.insert(
                day.to_string(),
                DayRecord::ByPhrase(BTreeMap::from([("Om".to_string(), u64::MAX)])),
            );
        }

        let stats = aggregate(&history, "Om", date(2024, 1, 1), date(2024, 1, 2));
        assert_eq!(stats.total, u64::MAX);
        assert_eq!(stats.average, 1 << 63);
    }

    #[test]
    fn test_day_labels() {
        let sunday = date(2024, 1, 7);
        assert_eq!(DayLabel::DateKey.render(sunday), "2024-01-07");
        assert_eq!(DayLabel::Weekday.render(sunday), "Sun");
        assert_eq!(DayLabel::DayOfMonth.render(sunday), "7");
    }

    #[test]
    fn test_dashboard_summary() {
        let mut profile = Profile::new_default(&TrackerConfig::default(), date(2024, 1, 2));
        profile.history = mixed_history();
        profile.history.insert(
            "2024-01-03".to_string(),
            DayRecord::ByPhrase(BTreeMap::from([
                ("Om".to_string(), 120),
                ("Hare Krishna".to_string(), 4),
            ])),
        );
        profile.streak = 3;
        profile.max_streak = 9;

        let summary = DashboardSummary::from_profile(&profile, "Om", date(2024, 1, 3));
        assert_eq!(summary.today_count, 120);
        assert_eq!(summary.today_total, 124);
        assert_eq!(summary.highest_day_total, 124);
        assert_eq!(summary.rounds.rounds_completed, 1);
        assert_eq!(summary.rounds.current_round_progress, 12);
        assert_eq!(summary.streak, 3);
        assert_eq!(summary.max_streak, 9);
    }

    #[test]
    fn test_period_stats_serialization() {
        let stats = aggregate(&mixed_history(), "Om", date(2024, 1, 1), date(2024, 1, 1));
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"total\":10"));
        assert!(json.contains("\"average\":10"));
        assert!(json.contains("\"date\":\"2024-01-01\""));
    }
}
