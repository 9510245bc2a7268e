//! Streak calculation module
//!
//! Consecutive-day activity counter, advanced on every positive increment.
//! The stored counter is not trusted blindly: when a profile was already
//! active today but carries a zero streak, the streak is re-derived from
//! yesterday's history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::day_record::read_day_total;
use crate::models::{History, Profile};
use crate::trends::daily::{date_key, yesterday};

/// Streak fields of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub streak: u32,
    pub max_streak: u32,
    pub last_active_date: Option<String>,
}

impl StreakState {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            streak: profile.streak,
            max_streak: profile.max_streak,
            last_active_date: profile.last_active_date.clone(),
        }
    }

    pub fn apply_to(self, profile: &mut Profile) {
        profile.streak = self.streak;
        profile.max_streak = self.max_streak;
        profile.last_active_date = self.last_active_date;
    }
}

/// Which rule fired for a positive increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    /// Already active today with a live streak
    Unchanged,
    /// Active today but the stored streak was zero; yesterday was active
    RecoveredWithYesterday,
    /// Active today but the stored streak was zero; yesterday was empty
    RecoveredFresh,
    /// Last active yesterday
    Continued,
    /// Gap of two or more days, or never active
    Reset,
}

/// Result of advancing the streak
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub state: StreakState,
    pub transition: StreakTransition,
}

/// Compute the streak after a positive increment recorded on `today`.
///
/// `history` is consulted only in the recovery case, and only for the day
/// before `today`.
pub fn advance(state: &StreakState, history: &History, today: NaiveDate) -> StreakUpdate {
    let today_key = date_key(today);
    let yesterday_key = date_key(yesterday(today));

    let (streak, transition) = match state.last_active_date.as_deref() {
        Some(last) if last == today_key => {
            if state.streak >= 1 {
                (state.streak, StreakTransition::Unchanged)
            } else if read_day_total(history.get(&yesterday_key), None) > 0 {
                (2, StreakTransition::RecoveredWithYesterday)
            } else {
                (1, StreakTransition::RecoveredFresh)
            }
        }
        Some(last) if last == yesterday_key => {
            (state.streak.saturating_add(1), StreakTransition::Continued)
        }
        _ => (1, StreakTransition::Reset),
    };

    StreakUpdate {
        state: StreakState {
            streak,
            max_streak: streak.max(state.max_streak),
            last_active_date: Some(today_key),
        },
        transition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayRecord;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state(streak: u32, max_streak: u32, last: Option<&str>) -> StreakState {
        StreakState {
            streak,
            max_streak,
            last_active_date: last.map(|s| s.to_string()),
        }
    }

    fn history_with(day: &str, record: DayRecord) -> History {
        BTreeMap::from([(day.to_string(), record)])
    }

    #[test]
    fn test_same_day_is_idempotent() {
        let update = advance(&state(4, 10, Some("2024-05-10")), &History::new(), date(2024, 5, 10));
        assert_eq!(update.transition, StreakTransition::Unchanged);
        assert_eq!(update.state, state(4, 10, Some("2024-05-10")));
    }

    #[test]
    fn test_recovery_links_active_yesterday() {
        let history = history_with(
            "2024-05-09",
            DayRecord::ByPhrase(BTreeMap::from([("Om".to_string(), 1)])),
        );
        let update = advance(&state(0, 0, Some("2024-05-10")), &history, date(2024, 5, 10));
        assert_eq!(update.transition, StreakTransition::RecoveredWithYesterday);
        assert_eq!(update.state.streak, 2);
        assert_eq!(update.state.max_streak, 2);
    }

    #[test]
    fn test_recovery_counts_legacy_yesterday() {
        let history = history_with("2024-05-09", DayRecord::Legacy(3));
        let update = advance(&state(0, 5, Some("2024-05-10")), &history, date(2024, 5, 10));
        assert_eq!(update.state.streak, 2);
        assert_eq!(update.state.max_streak, 5);
    }

    #[test]
    fn test_recovery_without_yesterday_starts_fresh() {
        // Empty record yesterday, activity two days ago does not count
        let mut history = history_with("2024-05-09", DayRecord::default());
        history.insert("2024-05-08".to_string(), DayRecord::Legacy(50));

        let update = advance(&state(0, 0, Some("2024-05-10")), &history, date(2024, 5, 10));
        assert_eq!(update.transition, StreakTransition::RecoveredFresh);
        assert_eq!(update.state.streak, 1);
    }

    #[test]
    fn test_consecutive_day_continues() {
        let update = advance(&state(6, 6, Some("2024-05-09")), &History::new(), date(2024, 5, 10));
        assert_eq!(update.transition, StreakTransition::Continued);
        assert_eq!(update.state, state(7, 7, Some("2024-05-10")));
    }

    #[test]
    fn test_consecutive_day_across_month_boundary() {
        let update = advance(&state(2, 8, Some("2024-02-29")), &History::new(), date(2024, 3, 1));
        assert_eq!(update.state, state(3, 8, Some("2024-03-01")));
    }

    #[test]
    fn test_gap_resets() {
        let update = advance(
            &state(30, 30, Some("2024-05-08")),
            &History::new(),
            date(2024, 5, 10),
        );
        assert_eq!(update.transition, StreakTransition::Reset);
        assert_eq!(update.state, state(1, 30, Some("2024-05-10")));
    }

    #[test]
    fn test_never_active_resets_to_one() {
        let update = advance(&StreakState::default(), &History::new(), date(2024, 5, 10));
        assert_eq!(update.transition, StreakTransition::Reset);
        assert_eq!(update.state, state(1, 1, Some("2024-05-10")));
    }

    #[test]
    fn test_future_last_active_date_resets() {
        let update = advance(&state(3, 3, Some("2024-05-12")), &History::new(), date(2024, 5, 10));
        assert_eq!(update.state.streak, 1);
    }

    #[test]
    fn test_max_streak_never_decreases() {
        let mut current = state(0, 12, None);
        let mut today = date(2024, 5, 1);
        for step in 0..20 {
            // Skip a day every fifth step to force resets
            today += chrono::Duration::days(if step % 5 == 4 { 2 } else { 1 });
            let update = advance(&current, &History::new(), today);
            assert!(update.state.max_streak >= current.max_streak);
            assert!(update.state.max_streak >= update.state.streak);
            current = update.state;
        }
    }
}
