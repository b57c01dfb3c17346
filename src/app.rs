//! Process-level wiring: database, ledger, content and the session driver.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::logging::{self, FileLogGuard};
use crate::progress::{ProgressLedger, UserProgress};
use crate::session::{spawn_ledger_refresh, Session, SessionDriver, SessionError, SessionResult};
use crate::storage::{ContentPack, DatabaseManager, SeedReport, WordRepository};

pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseManager,
    pub words: Arc<WordRepository>,
    pub ledger: Arc<ProgressLedger>,
    pub driver: SessionDriver,
    log_guard: Option<FileLogGuard>,
}

impl AppState {
    /// Installs logging, then opens the configured database with the wall
    /// clock.
    pub fn open(config: AppConfig) -> SessionResult<Self> {
        let log_guard = logging::init_tracing(&config);
        let db = DatabaseManager::new(&config.db_path).map_err(|e| SessionError::StoreInitFailure(e.to_string()))?;
        let mut state = Self::with_parts(config, db, Arc::new(SystemClock));
        state.log_guard = log_guard;
        Ok(state)
    }

    pub fn with_parts(config: AppConfig, db: DatabaseManager, clock: Arc<dyn Clock>) -> Self {
        let words = Arc::new(db.word_repository());
        let ledger = Arc::new(ProgressLedger::open(Arc::new(db.kv_store()), Arc::clone(&clock)));
        let session = Session::new(
            words.clone(),
            Arc::clone(&ledger),
            clock,
            Box::new(ChaCha8Rng::from_entropy()),
            config.feedback_delay,
        );
        info!(db = %db.db_path(), "app state ready");

        Self {
            config,
            db,
            words,
            ledger,
            driver: SessionDriver::new(session),
            log_guard: None,
        }
    }

    /// Reads the content directory and seeds it. A missing directory only
    /// marks the existing index ready.
    pub async fn load_content(&self) -> SessionResult<SeedReport> {
        let dir = &self.config.content_dir;
        let packs = if dir.is_dir() {
            match ContentPack::load_dir(dir) {
                Ok(packs) => packs,
                Err(e) => {
                    let reason = format!("failed to read content packs: {}", e);
                    self.driver.session().lock().await.mark_failed(reason.clone());
                    return Err(SessionError::StoreInitFailure(reason));
                }
            }
        } else {
            warn!(dir = %dir.display(), "content directory missing, using stored content");
            Vec::new()
        };

        self.driver.load_content(Arc::clone(&self.words), packs).await
    }

    /// Whether this state owns the rolling file writer.
    pub fn writes_log_file(&self) -> bool {
        self.log_guard.is_some()
    }

    pub fn spawn_ledger_refresh(&self) -> (watch::Receiver<UserProgress>, JoinHandle<()>) {
        spawn_ledger_refresh(Arc::clone(&self.ledger), self.config.ledger_refresh_interval)
    }
}
