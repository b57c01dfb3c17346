//! Day lock
//!
//! Days 1 to 3 of every track are free. From day 4 on, at most one day may be
//! finished per calendar day, and the limit is shared by every track: the
//! check reads the single global `last_completion_date`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use serde::Serialize;

use super::UserProgress;

/// Highest day number that is never gated.
pub const FREE_DAYS: u32 = 3;

/// Result of a lock check. Recompute on every read; the countdown goes stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayLock {
    pub locked: bool,
    /// Time left until local midnight; zero when unlocked
    #[serde(serialize_with = "serialize_countdown")]
    pub remaining: Duration,
    /// Date the lock lifts; `None` when unlocked
    pub next_unlock_date: Option<NaiveDate>,
}

impl DayLock {
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            remaining: Duration::zero(),
            next_unlock_date: None,
        }
    }

    /// `HH:MM:SS` while locked, empty otherwise.
    pub fn countdown(&self) -> String {
        if self.locked {
            format_countdown(self.remaining)
        } else {
            String::new()
        }
    }
}

/// Decides whether `next_day` may start at `now`.
pub fn check_day_lock<Tz: TimeZone>(next_day: u32, progress: &UserProgress, now: &DateTime<Tz>) -> DayLock {
    if next_day <= FREE_DAYS {
        return DayLock::unlocked();
    }

    let today = now.date_naive();
    if progress.last_completion_date != Some(today) {
        return DayLock::unlocked();
    }

    let tomorrow = today.succ_opt();
    let remaining = tomorrow
        .and_then(|date| {
            now.timezone()
                .from_local_datetime(&date.and_time(NaiveTime::MIN))
                .earliest()
        })
        .map(|midnight| midnight.signed_duration_since(now.clone()))
        .unwrap_or_else(|| Duration::hours(24))
        .max(Duration::zero());

    DayLock {
        locked: true,
        remaining,
        next_unlock_date: tomorrow,
    }
}

/// Formats a duration as zero-padded `HH:MM:SS`.
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

fn serialize_countdown<S: serde::Serializer>(remaining: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_countdown(*remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn completed_on(date: NaiveDate) -> UserProgress {
        UserProgress {
            last_completion_date: Some(date),
            ..Default::default()
        }
    }

    #[test]
    fn test_free_days_never_locked() {
        let now = at("2026-10-19T10:00:00+05:45");
        let progress = completed_on(now.date_naive());

        for day in 1..=FREE_DAYS {
            let lock = check_day_lock(day, &progress, &now);
            assert!(!lock.locked, "day {} should be free", day);
            assert_eq!(lock.countdown(), "");
        }
    }

    #[test]
    fn test_day_four_locked_after_completion_today() {
        let now = at("2026-10-19T22:30:00+05:45");
        let lock = check_day_lock(4, &completed_on(now.date_naive()), &now);

        assert!(lock.locked);
        assert_eq!(lock.remaining, Duration::minutes(90));
        assert_eq!(lock.countdown(), "01:30:00");
        assert_eq!(lock.next_unlock_date, NaiveDate::from_ymd_opt(2026, 10, 20));
    }

    #[test]
    fn test_completion_yesterday_does_not_lock() {
        let now = at("2026-10-19T00:00:01+05:30");
        let yesterday = now.date_naive().pred_opt().unwrap();
        let lock = check_day_lock(10, &completed_on(yesterday), &now);
        assert_eq!(lock, DayLock::unlocked());
    }

    #[test]
    fn test_fresh_ledger_never_locked() {
        let now = at("2026-10-19T12:00:00+00:00");
        assert!(!check_day_lock(42, &UserProgress::default(), &now).locked);
    }

    #[test]
    fn test_countdown_just_after_midnight() {
        let now = at("2026-10-19T00:00:05+05:45");
        let lock = check_day_lock(5, &completed_on(now.date_naive()), &now);
        assert_eq!(lock.countdown(), "23:59:55");
    }

    #[test]
    fn test_format_countdown_clamps_negative() {
        assert_eq!(format_countdown(Duration::seconds(-5)), "00:00:00");
        assert_eq!(format_countdown(Duration::seconds(3 * 3600 + 7 * 60 + 9)), "03:07:09");
    }

    #[test]
    fn test_serializes_countdown_string() {
        let now = at("2026-10-19T23:00:00+05:45");
        let lock = check_day_lock(4, &completed_on(now.date_naive()), &now);
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["remaining"], "01:00:00");
        assert_eq!(json["next_unlock_date"], "2026-10-20");
    }
}
