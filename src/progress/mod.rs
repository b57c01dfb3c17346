//! Progress ledger
//!
//! Owns every piece of learner progress:
//! - per-track day pointer (its own key per track)
//! - completion history, streak and the global completion date (one JSON blob)
//! - the preferred language
//!
//! All reads and writes go through [`ProgressLedger`], which keeps the
//! pointer equal to `max(completed days) + 1` for every track.

pub mod lock;

pub use lock::{check_day_lock, format_countdown, DayLock, FREE_DAYS};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::storage::{KeyValueStore, Language, Level, Track};

/// Aggregate ledger blob key.
pub const LEDGER_KEY: &str = "chandrama_elite_v2";
/// Last language the learner opened.
pub const PREFERRED_LANGUAGE_KEY: &str = "chandrama_pref_lang";

// ============================================================
// UserProgress - persisted blob
// ============================================================

/// Persisted learner progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    /// Consecutive calendar days with a finished assessment
    pub streak: u32,
    /// Date of the last streak update
    #[serde(with = "lenient_date")]
    pub last_date: Option<NaiveDate>,
    /// Date of the most recent day completion, read by the day lock
    #[serde(with = "lenient_date")]
    pub last_completion_date: Option<NaiveDate>,
    /// `<language>_<level>` → completed day numbers
    pub completed_history: BTreeMap<String, BTreeSet<u32>>,
    /// Promotion counters, carried so older blobs round-trip
    pub ad_triggers: AdTriggers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdTriggers {
    pub video: u32,
    pub pop_under: u32,
    #[serde(with = "lenient_date")]
    pub last_date: Option<NaiveDate>,
}

impl UserProgress {
    pub fn completed_days(&self, track: Track) -> Option<&BTreeSet<u32>> {
        self.completed_history.get(&track.history_key())
    }

    pub fn is_completed(&self, track: Track, day: u32) -> bool {
        self.completed_days(track)
            .is_some_and(|days| days.contains(&day))
    }

    /// Completed days, most recent first, as the archive lists them.
    pub fn completed_days_desc(&self, track: Track) -> Vec<u32> {
        self.completed_days(track)
            .map(|days| days.iter().rev().copied().collect())
            .unwrap_or_default()
    }
}

/// Dates are written as `YYYY-MM-DD`. Reading also accepts the
/// `Mon Oct 19 2026` form of older blobs. Blanks, junk and non-string values
/// read as `None` without failing the rest of the blob.
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    const ISO: &str = "%Y-%m-%d";
    const LEGACY: &str = "%a %b %d %Y";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format(ISO).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(str::trim).and_then(|s| {
            NaiveDate::parse_from_str(s, ISO)
                .or_else(|_| NaiveDate::parse_from_str(s, LEGACY))
                .ok()
        }))
    }
}

// ============================================================
// ProgressLedger
// ============================================================

/// Result of recording a finished day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCompletion {
    /// False when the day was already in the history
    pub newly_completed: bool,
    /// Track pointer after the call
    pub pointer: u32,
    pub streak: u32,
}

struct LedgerState {
    progress: UserProgress,
    pointers: HashMap<Track, u32>,
}

/// Handle to the learner's progress.
///
/// Mutations hold one lock for their whole read-modify-write, then persist
/// synchronously. A failed write is logged and the in-memory ledger keeps the
/// update for the rest of the session.
pub struct ProgressLedger {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl ProgressLedger {
    /// Loads the ledger blob, falling back to defaults when it is missing or
    /// unreadable.
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let progress = load_progress(store.as_ref());
        Self {
            store,
            clock,
            state: Mutex::new(LedgerState {
                progress,
                pointers: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current ledger.
    pub fn get_progress(&self) -> UserProgress {
        self.state().progress.clone()
    }

    /// Next unfinished day of the track; 1 when nothing is stored.
    pub fn get_day_pointer(&self, language: Language, level: Level) -> u32 {
        let track = Track::new(language, level);
        let mut state = self.state();
        self.pointer_locked(&mut state, track)
    }

    fn pointer_locked(&self, state: &mut LedgerState, track: Track) -> u32 {
        if let Some(pointer) = state.pointers.get(&track) {
            return *pointer;
        }

        let pointer = match self.store.get(&track.pointer_key()) {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    warn!(track = %track, raw = %raw, "unreadable day pointer, using 1");
                    1
                }
            },
            Ok(None) => 1,
            Err(e) => {
                warn!(track = %track, error = %e, "failed to read day pointer, using 1");
                1
            }
        };

        state.pointers.insert(track, pointer);
        pointer
    }

    /// Records `day` as finished for the track. Idempotent.
    pub fn complete_day(&self, language: Language, level: Level, day: u32) -> DayCompletion {
        let track = Track::new(language, level);
        let mut state = self.state();
        self.complete_day_locked(&mut state, track, day)
    }

    fn complete_day_locked(&self, state: &mut LedgerState, track: Track, day: u32) -> DayCompletion {
        let already = state.progress.is_completed(track, day);
        let in_range = day.checked_add(1).is_some();
        if !in_range {
            warn!(track = %track, day, "day number out of range, ignored");
        }
        if day == 0 || already || !in_range {
            let pointer = self.pointer_locked(state, track);
            return DayCompletion {
                newly_completed: false,
                pointer,
                streak: state.progress.streak,
            };
        }

        let days = state
            .progress
            .completed_history
            .entry(track.history_key())
            .or_default();
        days.insert(day);
        let pointer = days.iter().next_back().copied().unwrap_or(day).saturating_add(1);

        state.pointers.insert(track, pointer);
        if let Err(e) = self.store.set(&track.pointer_key(), &pointer.to_string()) {
            warn!(track = %track, error = %e, "failed to persist day pointer");
        }

        state.progress.last_completion_date = Some(self.clock.today());
        self.persist(&state.progress);

        info!(track = %track, day, pointer, "day completed");
        DayCompletion {
            newly_completed: true,
            pointer,
            streak: state.progress.streak,
        }
    }

    /// Advances, restarts or keeps the streak by calendar day.
    pub fn update_streak(&self) -> u32 {
        let mut state = self.state();
        self.update_streak_locked(&mut state)
    }

    fn update_streak_locked(&self, state: &mut LedgerState) -> u32 {
        let today = self.clock.today();
        let yesterday = today.pred_opt();
        let progress = &mut state.progress;

        if progress.last_date.is_some() && progress.last_date == yesterday {
            progress.streak += 1;
        } else if progress.last_date != Some(today) {
            progress.streak = 1;
        }
        progress.last_date = Some(today);

        let streak = progress.streak;
        self.persist(&state.progress);
        debug!(streak, "streak updated");
        streak
    }

    /// Streak update followed by day completion, as one step. Called once
    /// when a final assessment finishes.
    pub fn complete_session(&self, language: Language, level: Level, day: u32) -> DayCompletion {
        let track = Track::new(language, level);
        let mut state = self.state();
        self.update_streak_locked(&mut state);
        self.complete_day_locked(&mut state, track, day)
    }

    pub fn preferred_language(&self) -> Option<Language> {
        match self.store.get(PREFERRED_LANGUAGE_KEY) {
            Ok(raw) => raw.and_then(|s| s.parse().ok()),
            Err(e) => {
                warn!(error = %e, "failed to read preferred language");
                None
            }
        }
    }

    pub fn set_preferred_language(&self, language: Language) {
        if let Err(e) = self.store.set(PREFERRED_LANGUAGE_KEY, language.as_str()) {
            warn!(error = %e, "failed to persist preferred language");
        }
    }

    fn persist(&self, progress: &UserProgress) {
        let result = serde_json::to_string(progress)
            .map_err(crate::storage::StorageError::from)
            .and_then(|json| self.store.set(LEDGER_KEY, &json));

        if let Err(e) = result {
            warn!(error = %e, "failed to persist ledger, keeping in-memory copy");
        }
    }
}

fn load_progress(store: &dyn KeyValueStore) -> UserProgress {
    let raw = match store.get(LEDGER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return UserProgress::default(),
        Err(e) => {
            warn!(error = %e, "failed to read ledger, starting from defaults");
            return UserProgress::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(progress) => progress,
        Err(e) => {
            warn!(error = %e, "corrupt ledger blob, starting from defaults");
            UserProgress::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::{Level, MemoryKeyValueStore};
    use chrono::Duration;

    const NEPALI: Language = Language::Nepali;
    const HINDI: Language = Language::Hindi;

    fn setup() -> (Arc<MemoryKeyValueStore>, Arc<FixedClock>, ProgressLedger) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let clock = Arc::new(FixedClock::at("2026-10-19T09:00:00+05:45").unwrap());
        let ledger = ProgressLedger::open(store.clone(), clock.clone());
        (store, clock, ledger)
    }

    #[test]
    fn test_fresh_ledger_defaults() {
        let (_store, _clock, ledger) = setup();
        let progress = ledger.get_progress();

        assert_eq!(progress.streak, 0);
        assert!(progress.completed_history.is_empty());
        assert_eq!(progress.last_completion_date, None);
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Beginner), 1);
    }

    #[test]
    fn test_complete_day_is_idempotent() {
        let (store, clock, ledger) = setup();

        let first = ledger.complete_day(NEPALI, Level::Beginner, 1);
        assert!(first.newly_completed);
        assert_eq!(first.pointer, 2);
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Beginner), 2);

        let again = ledger.complete_day(NEPALI, Level::Beginner, 1);
        assert!(!again.newly_completed);
        assert_eq!(again.pointer, 2);

        let progress = ledger.get_progress();
        let days: Vec<_> = progress
            .completed_days(Track::new(NEPALI, Level::Beginner))
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(days, vec![1]);
        assert_eq!(progress.last_completion_date, Some(clock.today()));

        assert_eq!(
            store.get("chandrama_beginner_nepali_pointer").unwrap().as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_pointer_tracks_historical_max() {
        let (_store, _clock, ledger) = setup();

        ledger.complete_day(HINDI, Level::Advanced, 3);
        assert_eq!(ledger.get_day_pointer(HINDI, Level::Advanced), 4);

        // replaying an older day leaves the pointer alone
        ledger.complete_day(HINDI, Level::Advanced, 1);
        assert_eq!(ledger.get_day_pointer(HINDI, Level::Advanced), 4);

        ledger.complete_day(HINDI, Level::Advanced, 4);
        assert_eq!(ledger.get_day_pointer(HINDI, Level::Advanced), 5);

        // other tracks are untouched
        assert_eq!(ledger.get_day_pointer(HINDI, Level::Beginner), 1);
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Advanced), 1);
    }

    #[test]
    fn test_streak_consecutive_days() {
        let (_store, clock, ledger) = setup();

        assert_eq!(ledger.update_streak(), 1);
        clock.advance(Duration::days(1));
        assert_eq!(ledger.update_streak(), 2);
    }

    #[test]
    fn test_streak_same_day_unchanged() {
        let (_store, clock, ledger) = setup();

        assert_eq!(ledger.update_streak(), 1);
        clock.advance(Duration::hours(3));
        assert_eq!(ledger.update_streak(), 1);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let (_store, clock, ledger) = setup();

        ledger.update_streak();
        clock.advance(Duration::days(1));
        assert_eq!(ledger.update_streak(), 2);

        clock.advance(Duration::days(2));
        assert_eq!(ledger.update_streak(), 1);
    }

    #[test]
    fn test_streak_uses_calendar_days_not_elapsed_time() {
        let (_store, clock, ledger) = setup();

        clock.set(chrono::DateTime::parse_from_rfc3339("2026-10-19T23:50:00+05:45").unwrap());
        ledger.update_streak();

        // twenty minutes later is already the next calendar day
        clock.advance(Duration::minutes(20));
        assert_eq!(ledger.update_streak(), 2);
    }

    #[test]
    fn test_complete_session_updates_streak_and_day() {
        let (_store, _clock, ledger) = setup();

        let outcome = ledger.complete_session(NEPALI, Level::Intermediate, 1);
        assert!(outcome.newly_completed);
        assert_eq!(outcome.pointer, 2);
        assert_eq!(outcome.streak, 1);

        let progress = ledger.get_progress();
        assert_eq!(progress.streak, 1);
        assert!(progress.is_completed(Track::new(NEPALI, Level::Intermediate), 1));
    }

    #[test]
    fn test_ledger_reloads_from_store() {
        let (store, clock, ledger) = setup();
        ledger.complete_session(HINDI, Level::Beginner, 1);
        ledger.complete_session(HINDI, Level::Beginner, 2);
        drop(ledger);

        let reopened = ProgressLedger::open(store, clock);
        assert_eq!(reopened.get_day_pointer(HINDI, Level::Beginner), 3);
        assert_eq!(
            reopened
                .get_progress()
                .completed_days_desc(Track::new(HINDI, Level::Beginner)),
            vec![2, 1]
        );
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_defaults() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(LEDGER_KEY, "{ this is not json").unwrap();
        store.set("chandrama_beginner_nepali_pointer", "banana").unwrap();
        let clock = Arc::new(FixedClock::at("2026-10-19T09:00:00+05:45").unwrap());

        let ledger = ProgressLedger::open(store, clock);
        assert_eq!(ledger.get_progress(), UserProgress::default());
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Beginner), 1);
    }

    #[test]
    fn test_legacy_blob_is_read() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(
                LEDGER_KEY,
                r#"{
                    "streak": 4,
                    "lastDate": "Sun Oct 18 2026",
                    "unlockedDays": 1,
                    "lastCompletionDate": "",
                    "completionsToday": 0,
                    "completedHistory": {"nepali_beginner": [1, 2, 2, 3]},
                    "adTriggers": {"video": 1, "popUnder": 0, "lastDate": ""}
                }"#,
            )
            .unwrap();
        let clock = Arc::new(FixedClock::at("2026-10-19T09:00:00+05:45").unwrap());

        let ledger = ProgressLedger::open(store, clock);
        let progress = ledger.get_progress();
        assert_eq!(progress.streak, 4);
        assert_eq!(progress.last_date, NaiveDate::from_ymd_opt(2026, 10, 18));
        assert_eq!(progress.last_completion_date, None);
        assert_eq!(progress.ad_triggers.video, 1);
        assert_eq!(
            progress.completed_days_desc(Track::new(NEPALI, Level::Beginner)),
            vec![3, 2, 1]
        );

        // yesterday's date continues the streak
        assert_eq!(ledger.update_streak(), 5);
    }

    #[test]
    fn test_non_string_dates_keep_rest_of_blob() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(
                LEDGER_KEY,
                r#"{
                    "streak": 4,
                    "lastDate": 20261018,
                    "lastCompletionDate": {"day": 18},
                    "completedHistory": {"nepali_beginner": [1, 2]}
                }"#,
            )
            .unwrap();
        let clock = Arc::new(FixedClock::at("2026-10-19T09:00:00+05:45").unwrap());

        let ledger = ProgressLedger::open(store, clock);
        let progress = ledger.get_progress();
        assert_eq!(progress.streak, 4);
        assert_eq!(progress.last_date, None);
        assert_eq!(progress.last_completion_date, None);
        assert_eq!(
            progress.completed_days_desc(Track::new(NEPALI, Level::Beginner)),
            vec![2, 1]
        );
    }

    #[test]
    fn test_write_failure_keeps_in_memory_update() {
        let (store, _clock, ledger) = setup();
        store.set_read_only(true);

        let outcome = ledger.complete_session(NEPALI, Level::Beginner, 1);
        assert!(outcome.newly_completed);
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Beginner), 2);
        assert_eq!(ledger.get_progress().streak, 1);

        assert_eq!(store.get(LEDGER_KEY).unwrap(), None);
    }

    #[test]
    fn test_preferred_language_roundtrip() {
        let (_store, _clock, ledger) = setup();
        assert_eq!(ledger.preferred_language(), None);

        ledger.set_preferred_language(HINDI);
        assert_eq!(ledger.preferred_language(), Some(HINDI));
    }

    #[test]
    fn test_day_zero_is_ignored() {
        let (_store, _clock, ledger) = setup();
        let outcome = ledger.complete_day(NEPALI, Level::Beginner, 0);
        assert!(!outcome.newly_completed);
        assert!(ledger.get_progress().completed_history.is_empty());
    }

    #[test]
    fn test_max_day_is_ignored_without_overflow() {
        let (store, _clock, ledger) = setup();
        ledger.complete_day(NEPALI, Level::Beginner, 7);

        let outcome = ledger.complete_day(NEPALI, Level::Beginner, u32::MAX);
        assert!(!outcome.newly_completed);
        assert_eq!(outcome.pointer, 8);
        assert!(!ledger.get_progress().is_completed(Track::new(NEPALI, Level::Beginner), u32::MAX));
        assert_eq!(
            store.get("chandrama_beginner_nepali_pointer").unwrap(),
            Some("8".to_string())
        );

        let outcome = ledger.complete_session(NEPALI, Level::Beginner, u32::MAX);
        assert!(!outcome.newly_completed);
        assert_eq!(ledger.get_day_pointer(NEPALI, Level::Beginner), 8);
    }
}
