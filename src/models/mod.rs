//! Data models module
//!
//! Contains the data structures persisted in the profile document:
//! - Profile fields and history
//! - Day records in legacy and per-phrase shape

pub mod day_record;
pub mod profile;

pub use day_record::DayRecord;
pub use profile::{History, Profile};
