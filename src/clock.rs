//! Wall-clock source
//!
//! Every calendar decision (streaks, the day lock, completion dates) reads time
//! through [`Clock`] so tests can pin or advance it.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate};

pub trait Clock: Send + Sync {
    /// Current local time with its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The device's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Parses an RFC 3339 timestamp, e.g. `2026-10-19T09:00:00+05:45`.
    pub fn at(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self::new)
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advance_crosses_midnight() {
        let clock = FixedClock::at("2026-10-19T23:30:00+05:45").unwrap();
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }

    #[test]
    fn test_system_clock_today_matches_now() {
        let clock = SystemClock;
        let now = clock.now();
        let today = clock.today();
        assert!(today == now.date_naive() || today == now.date_naive().succ_opt().unwrap());
    }
}
