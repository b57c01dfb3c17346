//! Subscriber setup
//!
//! Console output always; a daily rolling file under [`AppConfig::log_dir`]
//! when file logging is switched on.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::AppConfig;

const LOG_FILE_PREFIX: &str = "chandrama.log";

/// Keeps the non-blocking file writer flushing; hold it for the life of the
/// process.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(log_dir: &Path) -> Option<(BoxedLayer, WorkerGuard)> {
    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("failed to create log directory {}: {err}", log_dir.display());
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .boxed();
    Some((layer, guard))
}

/// Installs the global subscriber from `config`. Only the first call in a
/// process installs anything; later calls return `None`.
pub fn init_tracing(config: &AppConfig) -> Option<FileLogGuard> {
    let (file, guard) = match config.log_dir.as_deref().and_then(file_layer) {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(file)
        .with(fmt::layer().with_target(true))
        .with(filter(&config.log_level))
        .try_init()
        .is_ok();

    match guard {
        Some(guard) if installed => Some(FileLogGuard { _guard: guard }),
        _ => None,
    }
}
