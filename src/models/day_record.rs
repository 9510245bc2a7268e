//! Per-day repetition records
//!
//! A day in the history is stored either in the legacy shape (a bare total
//! with no phrase attribution) or in the current shape (phrase -> count).
//! Both shapes are legal on read; any write upgrades the day to the
//! per-phrase shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counts recorded for one calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "StoredDayRecord")]
pub enum DayRecord {
    /// Bare total written by older app versions
    Legacy(u64),
    /// Count per phrase
    ByPhrase(BTreeMap<String, u64>),
}

/// Any day value found in a stored document. `null` days and `null`
/// counts read as empty and zero.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDayRecord {
    Legacy(u64),
    ByPhrase(BTreeMap<String, Option<u64>>),
    Null(()),
}

impl From<StoredDayRecord> for DayRecord {
    fn from(stored: StoredDayRecord) -> Self {
        match stored {
            StoredDayRecord::Legacy(total) => DayRecord::Legacy(total),
            StoredDayRecord::ByPhrase(counts) => DayRecord::ByPhrase(
                counts
                    .into_iter()
                    .map(|(phrase, count)| (phrase, count.unwrap_or(0)))
                    .collect(),
            ),
            StoredDayRecord::Null(()) => DayRecord::default(),
        }
    }
}

impl Default for DayRecord {
    fn default() -> Self {
        DayRecord::ByPhrase(BTreeMap::new())
    }
}

impl DayRecord {
    /// Sum over every phrase, or the raw number for a legacy day.
    /// Saturates at `u64::MAX`.
    pub fn total(&self) -> u64 {
        match self {
            DayRecord::Legacy(total) => *total,
            DayRecord::ByPhrase(counts) => counts
                .values()
                .fold(0u64, |sum, count| sum.saturating_add(*count)),
        }
    }

    /// Count attributed to `phrase`. Legacy days carry no attribution.
    pub fn count_for(&self, phrase: &str) -> u64 {
        match self {
            DayRecord::Legacy(_) => 0,
            DayRecord::ByPhrase(counts) => counts.get(phrase).copied().unwrap_or(0),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, DayRecord::Legacy(_))
    }
}

/// Read a day's value.
///
/// With `phrase = None` this is the aggregate over all phrases (a legacy
/// day contributes its raw number). With a phrase it is that phrase's
/// count, which is always 0 on a legacy day. An absent record reads as 0.
pub fn read_day_total(record: Option<&DayRecord>, phrase: Option<&str>) -> u64 {
    match (record, phrase) {
        (None, _) => 0,
        (Some(record), None) => record.total(),
        (Some(record), Some(phrase)) => record.count_for(phrase),
    }
}

/// Per-phrase view of a day, upgrading a legacy total to `phrase`.
///
/// This is the starting point for any modification of the day: the
/// unattributed legacy number is handed to the phrase being written.
pub fn upgrade_for_write(record: Option<&DayRecord>, phrase: &str) -> BTreeMap<String, u64> {
    match record {
        None => BTreeMap::new(),
        Some(DayRecord::Legacy(total)) => BTreeMap::from([(phrase.to_string(), *total)]),
        Some(DayRecord::ByPhrase(counts)) => counts.clone(),
    }
}

/// Set `phrase` to `new_value` on a day, returning the per-phrase record.
///
/// A legacy day becomes `{ phrase: legacy }` first and is then overwritten,
/// so the legacy total does not survive an explicit write. Callers reject
/// negative values before getting here.
pub fn write_day_value(record: Option<&DayRecord>, phrase: &str, new_value: u64) -> DayRecord {
    let mut counts = upgrade_for_write(record, phrase);
    counts.insert(phrase.to_string(), new_value);
    DayRecord::ByPhrase(counts)
}
