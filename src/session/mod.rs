//! Session state machine
//!
//! A session walks one learner through
//! `landing → level-select → progress-map → learning → completion → quiz-mcq
//! → quiz-score → quiz-final → summary`, with `history-view` reachable from the
//! progress map for days already finished.
//!
//! Intents are the only way in. The single self-transition is the quiz
//! auto-advance: answering returns [`Effect::ScheduleAdvance`] and the host
//! calls [`Session::fire_advance`] with that ticket once the feedback delay
//! has passed (see [`driver::SessionDriver`] for the tokio host).
//!
//! Gating always reads the ledger fresh; snapshots published for display are
//! never consulted for a decision.

pub mod driver;
pub mod timer;

pub use driver::{spawn_ledger_refresh, SessionDriver};
pub use timer::{AdvanceTicket, AdvanceTimer};

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::progress::{check_day_lock, DayLock, ProgressLedger};
use crate::quiz::{
    build_final_assessment, build_mcq, score, FinalQuestion, FinalQuestionType, McqQuestion, Question, QuizAttempt,
    QuizRun, RunStep,
};
use crate::storage::{ContentStore, Language, Level, StorageError, Track, Word};

// ============================================================
// Views and intents
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Landing,
    LevelSelect,
    ProgressMap,
    Learning,
    Completion,
    QuizMcq,
    QuizScore,
    QuizFinal,
    Summary,
    HistoryView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectLanguage(Language),
    SelectLevel(Level),
    /// Start the track's next day from the progress map
    BeginDay,
    /// Replay a finished day read-only
    OpenHistoryDay(u32),
    NextWord,
    PrevWord,
    StartQuiz,
    Answer(usize),
    ContinueToFinal,
    ReviseToday,
    NextDay,
    Back,
    GoHome,
}

/// What the host must do after an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Call [`Session::fire_advance`] with the ticket after `ticket.delay`
    ScheduleAdvance(AdvanceTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootStatus {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("content is still loading")]
    Booting,

    #[error("content store failed to initialize: {0}")]
    StoreInitFailure(String),

    #[error("no content available for {track} day {day}")]
    ContentUnavailable { track: Track, day: u32 },

    #[error("day {day} unlocks in {countdown}")]
    DayLocked { day: u32, countdown: String },

    #[error("day {0} has not been completed")]
    DayNotCompleted(u32),

    #[error("{intent:?} is not valid in {view:?}")]
    InvalidIntent { view: View, intent: Intent },

    #[error("no language or level selected")]
    NoTrackSelected,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Session-local fields. Reset by go-home; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub view: View,
    pub selected_language: Option<Language>,
    pub selected_level: Option<Level>,
    pub selected_day: u32,
    pub daily_words: Vec<Word>,
    pub current_word_index: usize,
    pub quiz_results: Vec<QuizAttempt>,
    pub final_score: u32,
}

impl SessionState {
    fn new(language: Option<Language>) -> Self {
        Self {
            view: View::Landing,
            selected_language: language,
            selected_level: None,
            selected_day: 1,
            daily_words: Vec::new(),
            current_word_index: 0,
            quiz_results: Vec::new(),
            final_score: 0,
        }
    }
}

// ============================================================
// Render data
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMapView {
    pub language: Language,
    pub level: Level,
    pub next_day: u32,
    pub lock: DayLock,
    /// Most recent first
    pub completed_days: Vec<u32>,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FinalQuestionType>,
    pub prompt: String,
    pub options: Vec<String>,
    pub position: usize,
    pub total: usize,
    pub locked: bool,
    pub selected: Option<usize>,
    /// Only revealed once the question is locked
    pub correct_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
    pub score: u32,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub day: u32,
    pub score: u32,
    pub total: usize,
    pub streak: u32,
    pub next_day: u32,
    pub next_lock: DayLock,
}

fn question_view<Q: Question>(run: &QuizRun<Q>, kind: Option<FinalQuestionType>) -> Option<QuestionView> {
    let question = run.current()?;
    let locked = run.is_locked();
    Some(QuestionView {
        kind,
        prompt: question.prompt().to_string(),
        options: question.options().to_vec(),
        position: run.position(),
        total: run.len(),
        locked,
        selected: run.selected(),
        correct_index: if locked { question.correct_index() } else { None },
    })
}

// ============================================================
// Session
// ============================================================

pub struct Session {
    state: SessionState,
    boot: BootStatus,
    content: Arc<dyn ContentStore>,
    ledger: Arc<ProgressLedger>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
    feedback_delay: Duration,
    mcq: Option<QuizRun<McqQuestion>>,
    assessment: Option<QuizRun<FinalQuestion>>,
    timer: AdvanceTimer,
}

impl Session {
    /// New session in the boot phase, language preset from the stored
    /// preference (Nepali when none).
    pub fn new(
        content: Arc<dyn ContentStore>,
        ledger: Arc<ProgressLedger>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RngCore + Send>,
        feedback_delay: Duration,
    ) -> Self {
        let language = ledger.preferred_language().unwrap_or(Language::Nepali);
        Self {
            state: SessionState::new(Some(language)),
            boot: BootStatus::Loading,
            content,
            ledger,
            clock,
            rng,
            feedback_delay,
            mcq: None,
            assessment: None,
            timer: AdvanceTimer::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> View {
        self.state.view
    }

    pub fn boot_status(&self) -> &BootStatus {
        &self.boot
    }

    pub fn ledger(&self) -> &Arc<ProgressLedger> {
        &self.ledger
    }

    pub fn pending_advance(&self) -> Option<AdvanceTicket> {
        self.timer.pending()
    }

    pub fn mark_ready(&mut self) {
        info!("content ready, session unblocked");
        self.boot = BootStatus::Ready;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "content failed to load");
        self.boot = BootStatus::Failed(reason);
    }

    fn ensure_ready(&self) -> SessionResult<()> {
        match &self.boot {
            BootStatus::Ready => Ok(()),
            BootStatus::Loading => Err(SessionError::Booting),
            BootStatus::Failed(reason) => Err(SessionError::StoreInitFailure(reason.clone())),
        }
    }

    fn track(&self) -> SessionResult<Track> {
        match (self.state.selected_language, self.state.selected_level) {
            (Some(language), Some(level)) => Ok(Track::new(language, level)),
            _ => Err(SessionError::NoTrackSelected),
        }
    }

    /// Applies one intent. A rejected intent leaves the state untouched.
    pub fn handle(&mut self, intent: Intent) -> SessionResult<Effect> {
        self.ensure_ready()?;

        if intent == Intent::GoHome {
            self.go_home();
            return Ok(Effect::None);
        }

        match (self.state.view, intent) {
            (View::Landing, Intent::SelectLanguage(language)) => {
                self.state.selected_language = Some(language);
                self.state.view = View::LevelSelect;
            }
            (View::LevelSelect, Intent::SelectLevel(level)) => {
                self.state.selected_level = Some(level);
                self.track()?;
                self.state.view = View::ProgressMap;
            }
            (View::LevelSelect, Intent::Back) => self.go_home(),
            (View::ProgressMap, Intent::BeginDay) => {
                let track = self.track()?;
                let day = self.ledger.get_day_pointer(track.language, track.level);
                self.ensure_unlocked(day)?;
                self.load_day(track, day, View::Learning)?;
            }
            (View::ProgressMap, Intent::OpenHistoryDay(day)) => {
                let track = self.track()?;
                if !self.ledger.get_progress().is_completed(track, day) {
                    return Err(SessionError::DayNotCompleted(day));
                }
                self.load_day(track, day, View::HistoryView)?;
            }
            (View::ProgressMap, Intent::Back) => self.state.view = View::LevelSelect,
            (View::Learning, Intent::NextWord) => {
                if self.state.current_word_index + 1 < self.state.daily_words.len() {
                    self.state.current_word_index += 1;
                } else {
                    self.state.view = View::Completion;
                }
            }
            (View::Learning, Intent::PrevWord) | (View::HistoryView, Intent::PrevWord) => {
                self.state.current_word_index = self.state.current_word_index.saturating_sub(1);
            }
            (View::HistoryView, Intent::NextWord) => {
                let last = self.state.daily_words.len().saturating_sub(1);
                self.state.current_word_index = (self.state.current_word_index + 1).min(last);
            }
            (View::HistoryView, Intent::Back) => {
                self.clear_batch();
                self.state.view = View::ProgressMap;
            }
            (View::Completion, Intent::StartQuiz) => {
                let questions = build_mcq(&self.state.daily_words, &mut *self.rng);
                self.mcq = Some(QuizRun::new(questions));
                self.state.quiz_results.clear();
                self.state.view = View::QuizMcq;
            }
            (View::QuizMcq, Intent::Answer(index)) => return Ok(self.answer_mcq(index)),
            (View::QuizScore, Intent::ContinueToFinal) => {
                let track = self.track()?;
                let questions = build_final_assessment(&self.state.daily_words, track.language, &mut *self.rng);
                self.assessment = Some(QuizRun::new(questions));
                self.state.final_score = 0;
                self.state.view = View::QuizFinal;
            }
            (View::QuizFinal, Intent::Answer(index)) => return Ok(self.answer_final(index)),
            (View::Summary, Intent::ReviseToday) => {
                self.state.current_word_index = 0;
                self.state.view = View::Learning;
            }
            (View::Summary, Intent::NextDay) => {
                let track = self.track()?;
                let day = match self.state.selected_day.checked_add(1) {
                    Some(day) => day,
                    None => {
                        warn!(%track, day = self.state.selected_day, "no day after the last day number");
                        return Err(SessionError::ContentUnavailable {
                            track,
                            day: self.state.selected_day,
                        });
                    }
                };
                self.ensure_unlocked(day)?;
                self.load_day(track, day, View::Learning)?;
            }
            (view, intent) => return Err(SessionError::InvalidIntent { view, intent }),
        }

        Ok(Effect::None)
    }

    fn ensure_unlocked(&self, day: u32) -> SessionResult<()> {
        let lock = check_day_lock(day, &self.ledger.get_progress(), &self.clock.now());
        if lock.locked {
            let countdown = lock.countdown();
            info!(day, countdown = %countdown, "day is locked");
            return Err(SessionError::DayLocked { day, countdown });
        }
        Ok(())
    }

    /// Fetches the batch and enters `view`. An empty day leaves the session
    /// where it was.
    fn load_day(&mut self, track: Track, day: u32, view: View) -> SessionResult<()> {
        let words = match self.content.fetch_daily_words(track.language, track.level, day) {
            Ok(words) => words,
            Err(StorageError::StoreUnavailable) => {
                warn!(%track, day, "content store not ready");
                return Err(SessionError::ContentUnavailable { track, day });
            }
            Err(e) => return Err(e.into()),
        };
        if words.is_empty() {
            warn!(%track, day, "no words for day");
            return Err(SessionError::ContentUnavailable { track, day });
        }

        debug!(%track, day, words = words.len(), "loaded day");
        self.cancel_pending();
        self.mcq = None;
        self.assessment = None;
        self.state.daily_words = words;
        self.state.current_word_index = 0;
        self.state.selected_day = day;
        self.state.quiz_results.clear();
        self.state.final_score = 0;
        self.state.view = view;
        self.ledger.set_preferred_language(track.language);
        Ok(())
    }

    fn answer_mcq(&mut self, index: usize) -> Effect {
        let feedback = self.mcq.as_mut().and_then(|run| run.answer(index));
        match feedback {
            Some(feedback) => {
                debug!(correct = feedback.correct, "mcq answered");
                self.schedule_advance()
            }
            None => Effect::None,
        }
    }

    fn answer_final(&mut self, index: usize) -> Effect {
        let feedback = self.assessment.as_mut().and_then(|run| run.answer(index));
        match feedback {
            Some(feedback) => {
                debug!(correct = feedback.correct, "final question answered");
                self.schedule_advance()
            }
            None => Effect::None,
        }
    }

    fn schedule_advance(&mut self) -> Effect {
        Effect::ScheduleAdvance(self.timer.schedule(self.clock.now(), self.feedback_delay))
    }

    fn cancel_pending(&mut self) {
        if self.timer.cancel() {
            debug!("pending advance cancelled");
        }
    }

    /// Runs the advance for `ticket`. Returns `false` for a stale ticket,
    /// which leaves the session untouched.
    pub fn fire_advance(&mut self, ticket: AdvanceTicket) -> SessionResult<bool> {
        if !self.timer.take_if_current(ticket) {
            debug!(epoch = ticket.epoch, "stale advance ignored");
            return Ok(false);
        }
        self.apply_advance()?;
        Ok(true)
    }

    /// Fires the pending advance if the clock says it is due. For hosts that
    /// poll instead of sleeping.
    pub fn tick(&mut self) -> SessionResult<bool> {
        match self.timer.take_due(self.clock.now()) {
            Some(_) => {
                self.apply_advance()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply_advance(&mut self) -> SessionResult<()> {
        match self.state.view {
            View::QuizMcq => {
                let step = self.mcq.as_mut().and_then(|run| run.advance());
                if let Some(RunStep::Finished { score, attempts }) = step {
                    info!(score, total = attempts.len(), "mcq finished");
                    self.state.quiz_results = attempts;
                    self.mcq = None;
                    self.state.view = View::QuizScore;
                }
            }
            View::QuizFinal => {
                let step = self.assessment.as_mut().and_then(|run| run.advance());
                if let Some(RunStep::Finished { score, .. }) = step {
                    let track = self.track()?;
                    let day = self.state.selected_day;
                    let completion = self.ledger.complete_session(track.language, track.level, day);
                    info!(
                        %track,
                        day,
                        score,
                        pointer = completion.pointer,
                        streak = completion.streak,
                        "final assessment finished"
                    );
                    self.state.final_score = score;
                    self.assessment = None;
                    self.state.view = View::Summary;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn clear_batch(&mut self) {
        self.cancel_pending();
        self.mcq = None;
        self.assessment = None;
        self.state.daily_words.clear();
        self.state.current_word_index = 0;
        self.state.quiz_results.clear();
        self.state.final_score = 0;
    }

    /// Back to landing. Language and level stay selected; the ledger is not
    /// touched.
    fn go_home(&mut self) {
        self.clear_batch();
        self.state.view = View::Landing;
    }

    // ========================================================
    // Render data
    // ========================================================

    pub fn progress_map(&self) -> Option<ProgressMapView> {
        if self.state.view != View::ProgressMap {
            return None;
        }
        let track = self.track().ok()?;
        let progress = self.ledger.get_progress();
        let next_day = self.ledger.get_day_pointer(track.language, track.level);
        Some(ProgressMapView {
            language: track.language,
            level: track.level,
            next_day,
            lock: check_day_lock(next_day, &progress, &self.clock.now()),
            completed_days: progress.completed_days_desc(track),
            streak: progress.streak,
        })
    }

    pub fn current_word(&self) -> Option<&Word> {
        match self.state.view {
            View::Learning | View::HistoryView => self.state.daily_words.get(self.state.current_word_index),
            _ => None,
        }
    }

    pub fn question(&self) -> Option<QuestionView> {
        match self.state.view {
            View::QuizMcq => self.mcq.as_ref().and_then(|run| question_view(run, None)),
            View::QuizFinal => self
                .assessment
                .as_ref()
                .and_then(|run| question_view(run, run.current().map(|q| q.kind))),
            _ => None,
        }
    }

    pub fn mcq_score(&self) -> Option<ScoreView> {
        if self.state.view != View::QuizScore {
            return None;
        }
        Some(ScoreView {
            score: score(&self.state.quiz_results),
            total: self.state.quiz_results.len(),
        })
    }

    pub fn summary(&self) -> Option<SummaryView> {
        if self.state.view != View::Summary {
            return None;
        }
        let progress = self.ledger.get_progress();
        let next_day = self.state.selected_day.saturating_add(1);
        Some(SummaryView {
            day: self.state.selected_day,
            score: self.state.final_score,
            total: self.state.daily_words.len(),
            streak: progress.streak,
            next_day,
            next_lock: check_day_lock(next_day, &progress, &self.clock.now()),
        })
    }
}
