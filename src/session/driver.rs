//! tokio host for a [`Session`]
//!
//! Owns the feedback-delay task and the ledger snapshot loop. The session
//! itself stays synchronous; the driver only sleeps and forwards tickets.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{AdvanceTicket, Effect, Intent, Session, SessionError, SessionResult};
use crate::progress::{ProgressLedger, UserProgress};
use crate::storage::{ContentPack, SeedReport, WordRepository};

#[derive(Clone)]
pub struct SessionDriver {
    session: Arc<Mutex<Session>>,
    advance_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionDriver {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            advance_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }

    /// Seeds the content index off the runtime threads, then unblocks the
    /// session or parks it in the failed state.
    pub async fn load_content(&self, repo: Arc<WordRepository>, packs: Vec<ContentPack>) -> SessionResult<SeedReport> {
        let result = tokio::task::spawn_blocking(move || repo.seed_all(&packs)).await;

        let mut session = self.session.lock().await;
        match result {
            Ok(Ok(report)) => {
                info!(
                    seeded = report.seeded_tracks.len(),
                    skipped = report.skipped_tracks.len(),
                    inserted = report.inserted,
                    "content loaded"
                );
                session.mark_ready();
                Ok(report)
            }
            Ok(Err(e)) => {
                session.mark_failed(e.to_string());
                Err(SessionError::StoreInitFailure(e.to_string()))
            }
            Err(join_err) => {
                session.mark_failed(join_err.to_string());
                Err(SessionError::StoreInitFailure(join_err.to_string()))
            }
        }
    }

    /// Applies an intent and runs whatever effect it asks for.
    pub async fn dispatch(&self, intent: Intent) -> SessionResult<()> {
        let going_home = intent == Intent::GoHome;
        let effect = {
            let mut session = self.session.lock().await;
            session.handle(intent)?
        };

        if going_home {
            self.abort_advance().await;
        }
        if let Effect::ScheduleAdvance(ticket) = effect {
            self.spawn_advance(ticket).await;
        }
        Ok(())
    }

    async fn spawn_advance(&self, ticket: AdvanceTicket) {
        let session = Arc::clone(&self.session);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ticket.delay).await;
            let mut session = session.lock().await;
            match session.fire_advance(ticket) {
                Ok(true) => debug!(epoch = ticket.epoch, view = ?session.view(), "advanced"),
                Ok(false) => {}
                Err(e) => error!(error = %e, "auto-advance failed"),
            }
        });

        let mut slot = self.advance_task.lock().await;
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    async fn abort_advance(&self) {
        let mut slot = self.advance_task.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

/// Publishes a ledger snapshot every `every`, for display only. The loop ends
/// once every receiver is gone.
pub fn spawn_ledger_refresh(
    ledger: Arc<ProgressLedger>,
    every: Duration,
) -> (watch::Receiver<UserProgress>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(ledger.get_progress());

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if tx.is_closed() {
                break;
            }
            let latest = ledger.get_progress();
            tx.send_if_modified(|current| {
                if *current == latest {
                    false
                } else {
                    *current = latest;
                    true
                }
            });
        }
        debug!("ledger refresh stopped");
    });

    (rx, handle)
}
