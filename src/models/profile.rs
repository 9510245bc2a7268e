//! Profile data types
//!
//! One profile document per signed-in identity.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::day_record::{self, DayRecord};
use crate::config::TrackerConfig;
use crate::trends::daily::date_key;

/// Repetition history keyed by `YYYY-MM-DD`
pub type History = BTreeMap<String, DayRecord>;

/// Default count-per-round target
pub const DEFAULT_DAILY_GOAL: u32 = 108;

fn default_daily_goal() -> u32 {
    DEFAULT_DAILY_GOAL
}

// Stored documents may carry explicit nulls; those read like absent fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_goal<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(DEFAULT_DAILY_GOAL))
}

/// Full profile record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Tracked phrases, in the order they were added
    #[serde(default, deserialize_with = "null_as_default")]
    pub phrases: Vec<String>,
    /// Phrase currently being counted
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_phrase: String,
    #[serde(default = "default_daily_goal", deserialize_with = "null_as_default_goal")]
    pub daily_goal: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub streak: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_streak: u32,
    /// Date key of the last positive increment
    #[serde(default)]
    pub last_active_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: History,
}

impl Profile {
    /// Profile created on first sign-in: configured phrases, empty streak,
    /// and a history seeded with an empty record for today.
    pub fn new_default(config: &TrackerConfig, today: NaiveDate) -> Self {
        let phrases = config.phrases();
        let active_phrase = phrases.first().cloned().unwrap_or_default();
        let today_key = date_key(today);

        Self {
            phrases,
            active_phrase,
            daily_goal: config.daily_goal(),
            streak: 0,
            max_streak: 0,
            last_active_date: Some(today_key.clone()),
            history: BTreeMap::from([(today_key, DayRecord::default())]),
        }
    }

    /// Active phrase, or `fallback` when the stored value is empty
    pub fn active_phrase_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.active_phrase.is_empty() {
            fallback
        } else {
            &self.active_phrase
        }
    }

    /// Count for `phrase` on `date`
    pub fn count_on(&self, date: NaiveDate, phrase: &str) -> u64 {
        day_record::read_day_total(self.history.get(&date_key(date)), Some(phrase))
    }

    /// Aggregate count across phrases on `date`
    pub fn total_on(&self, date: NaiveDate) -> u64 {
        day_record::read_day_total(self.history.get(&date_key(date)), None)
    }

    /// Goal for progress display; a stored zero is treated as the default
    pub fn effective_goal(&self) -> u32 {
        if self.daily_goal == 0 {
            DEFAULT_DAILY_GOAL
        } else {
            self.daily_goal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_default_profile() {
        let profile = Profile::new_default(&TrackerConfig::default(), date(2024, 3, 10));

        assert_eq!(profile.phrases.len(), 4);
        assert_eq!(profile.active_phrase, "Om Namah Shivaya");
        assert_eq!(profile.daily_goal, 108);
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.max_streak, 0);
        assert_eq!(profile.last_active_date.as_deref(), Some("2024-03-10"));
        assert_eq!(profile.history.len(), 1);
        assert_eq!(profile.history.get("2024-03-10"), Some(&DayRecord::default()));
    }

    #[test]
    fn test_profile_serialization_uses_camel_case() {
        let profile = Profile::new_default(&TrackerConfig::default(), date(2024, 3, 10));
        let json = serde_json::to_string(&profile).unwrap();

        assert!(json.contains("\"activePhrase\":\"Om Namah Shivaya\""));
        assert!(json.contains("\"dailyGoal\":108"));
        assert!(json.contains("\"maxStreak\":0"));
        assert!(json.contains("\"lastActiveDate\":\"2024-03-10\""));
        assert!(json.contains("\"history\":{\"2024-03-10\":{}}"));
    }

    #[test]
    fn test_sparse_document_uses_defaults() {
        let profile: Profile = serde_json::from_str(
            r#"{"history": {"2024-01-01": 5, "2024-01-02": {"Om": 3}}}"#,
        )
        .unwrap();

        assert_eq!(profile.daily_goal, DEFAULT_DAILY_GOAL);
        assert_eq!(profile.streak, 0);
        assert!(profile.last_active_date.is_none());
        assert_eq!(profile.history.get("2024-01-01"), Some(&DayRecord::Legacy(5)));
        assert_eq!(profile.total_on(date(2024, 1, 2)), 3);
        assert_eq!(profile.count_on(date(2024, 1, 1), "Om"), 0);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let profile: Profile = serde_json::from_str(
            r#"{
                "phrases": null,
                "activePhrase": null,
                "dailyGoal": null,
                "streak": null,
                "maxStreak": null,
                "lastActiveDate": null,
                "history": {"2024-01-01": null, "2024-01-02": {"Om": null, "Ram": 2}}
            }"#,
        )
        .unwrap();

        assert!(profile.phrases.is_empty());
        assert_eq!(profile.active_phrase, "");
        assert_eq!(profile.daily_goal, DEFAULT_DAILY_GOAL);
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.max_streak, 0);
        assert!(profile.last_active_date.is_none());
        assert_eq!(profile.history.get("2024-01-01"), Some(&DayRecord::default()));
        assert_eq!(profile.count_on(date(2024, 1, 2), "Om"), 0);
        assert_eq!(profile.total_on(date(2024, 1, 2)), 2);

        let null_history: Profile = serde_json::from_str(r#"{"history": null}"#).unwrap();
        assert!(null_history.history.is_empty());
    }

    #[test]
    fn test_active_phrase_fallback() {
        let mut profile = Profile::new_default(&TrackerConfig::default(), date(2024, 3, 10));
        assert_eq!(profile.active_phrase_or("Om"), "Om Namah Shivaya");

        profile.active_phrase.clear();
        assert_eq!(profile.active_phrase_or("Om"), "Om");
    }
}
