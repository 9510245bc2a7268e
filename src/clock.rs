//! Calendar clock
//!
//! Every "today"/"yesterday" decision goes through a [`Clock`] so that the
//! streak rules can be driven deterministically.

use std::sync::RwLock;

use chrono::{Local, NaiveDate};

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system's local date
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a settable date
#[derive(Debug)]
pub struct FixedClock {
    date: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    /// Move the clock to another date
    pub fn set(&self, date: NaiveDate) {
        let mut guard = self.date.write().unwrap_or_else(|e| e.into_inner());
        *guard = date;
    }

    /// Advance the clock by `days` calendar days
    pub fn advance_days(&self, days: i64) {
        let mut guard = self.date.write().unwrap_or_else(|e| e.into_inner());
        *guard += chrono::Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
