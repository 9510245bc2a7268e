//! Profile document codec
//!
//! Profiles are stored as JSON documents. Partial updates address fields by
//! dotted path (`history.2024-01-01`) so a single day can be written without
//! rewriting the rest of the history.

use std::fmt;

use serde_json::{Map, Value};

use crate::models::Profile;

/// Field names used by the first deployment, mapped to the current ones
const LEGACY_FIELD_NAMES: [(&str, &str); 2] =
    [("naams", "phrases"), ("currentNaam", "activePhrase")];

/// Addressable profile fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// One day of the history, by date key
    History(String),
    Streak,
    MaxStreak,
    LastActiveDate,
    ActivePhrase,
    DailyGoal,
    Phrases,
}

impl FieldPath {
    fn segments(&self) -> Vec<&str> {
        match self {
            FieldPath::History(date) => vec!["history", date.as_str()],
            FieldPath::Streak => vec!["streak"],
            FieldPath::MaxStreak => vec!["maxStreak"],
            FieldPath::LastActiveDate => vec!["lastActiveDate"],
            FieldPath::ActivePhrase => vec!["activePhrase"],
            FieldPath::DailyGoal => vec!["dailyGoal"],
            FieldPath::Phrases => vec!["phrases"],
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("."))
    }
}

/// Ordered set of field writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    fields: Vec<(FieldPath, Value)>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field write; a later write to the same path wins
    pub fn set(mut self, path: FieldPath, value: Value) -> Self {
        self.fields.retain(|(existing, _)| *existing != path);
        self.fields.push((path, value));
        self
    }

    pub fn fields(&self) -> &[(FieldPath, Value)] {
        &self.fields
    }

    /// Dotted paths touched by this update
    pub fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|(path, _)| path.to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write every field into `document`, leaving other fields alone
    pub fn apply_to(&self, document: &mut Value) {
        for (path, value) in &self.fields {
            set_path(document, &path.segments(), value.clone());
        }
    }
}

fn set_path(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        set_path(child, rest, value);
    }
}

/// Rename legacy field names in place. Returns true if anything changed.
///
/// When both the legacy and the current name are present the current one
/// is kept.
pub fn normalize_legacy_fields(document: &mut Value) -> bool {
    let Value::Object(map) = document else {
        return false;
    };

    let mut changed = false;
    for (legacy, current) in LEGACY_FIELD_NAMES {
        if let Some(value) = map.remove(legacy) {
            changed = true;
            if !map.contains_key(current) {
                map.insert(current.to_string(), value);
            }
        }
    }
    changed
}

/// Decode a stored document into a profile
pub fn decode_profile(mut document: Value) -> Result<Profile, serde_json::Error> {
    normalize_legacy_fields(&mut document);
    serde_json::from_value(document)
}

/// Encode a profile as a full document
pub fn encode_profile(profile: &Profile) -> Result<Value, serde_json::Error> {
    serde_json::to_value(profile)
}
