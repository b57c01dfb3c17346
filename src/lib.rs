//! Chandrama progression core
//!
//! Daily five-word batches per (language, level) track, a translation drill
//! and a five-type final assessment, with progress gated by calendar day.
//!
//! - [`storage`]: SQLite content index, key-value persistence, migrations
//! - [`progress`]: the learner ledger and the day lock
//! - [`quiz`]: question generators and the shared runner
//! - [`session`]: the view state machine and its tokio driver

pub mod app;
pub mod clock;
pub mod config;
pub mod logging;
pub mod progress;
pub mod quiz;
pub mod session;
pub mod storage;

pub use app::AppState;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use progress::{check_day_lock, DayLock, ProgressLedger, UserProgress};
pub use session::{Intent, Session, SessionDriver, SessionError, View};
pub use storage::{ContentStore, DatabaseManager, Language, Level, StorageError, Track, Word, WordRepository};
