use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./data/chandrama.db";
pub const DEFAULT_CONTENT_DIR: &str = "./content";
pub const DEFAULT_FEEDBACK_DELAY_MS: u64 = 700;
pub const DEFAULT_LEDGER_REFRESH_MS: u64 = 2000;
pub const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub content_dir: PathBuf,
    pub log_level: String,
    /// Directory for the rolling log file; `None` keeps logs on stdout only
    pub log_dir: Option<PathBuf>,
    /// Pause between a quiz answer and the next question
    pub feedback_delay: Duration,
    /// Interval of the cosmetic ledger snapshot refresh
    pub ledger_refresh_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Missing or
    /// unparsable values fall back to defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("CHANDRAMA_DB_PATH")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let content_dir = lookup("CHANDRAMA_CONTENT_DIR")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_DIR.to_string());

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = lookup("ENABLE_FILE_LOGS")
            .map(|value| matches!(value.trim(), "true" | "1"))
            .unwrap_or(false);
        let log_dir = file_logs.then(|| {
            lookup("LOG_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
        });

        let feedback_delay_ms = lookup("QUIZ_FEEDBACK_DELAY_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FEEDBACK_DELAY_MS);

        let refresh_ms = lookup("LEDGER_REFRESH_INTERVAL_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_LEDGER_REFRESH_MS);

        Self {
            db_path: PathBuf::from(db_path),
            content_dir: PathBuf::from(content_dir),
            log_level,
            log_dir,
            feedback_delay: Duration::from_millis(feedback_delay_ms),
            ledger_refresh_interval: Duration::from_millis(refresh_ms),
        }
    }
}
