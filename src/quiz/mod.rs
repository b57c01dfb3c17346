//! Quiz generation and scoring
//!
//! Two generators share one runner:
//! - [`mcq`]: four-option translation drill, one question per word in batch order
//! - [`assessment`]: five-type final assessment over a shuffled batch
//!
//! [`QuizRun`] locks a question on its first answer and only moves on when
//! the caller advances it, which the session does after the feedback delay.
//! Generation has no error path; small batches simply yield fewer options.

pub mod assessment;
pub mod mcq;

pub use assessment::{build_final_assessment, FinalQuestion, FinalQuestionType};
pub use mcq::{build_mcq, McqQuestion};

use serde::{Deserialize, Serialize};

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub word_id: String,
    pub correct: bool,
    pub user_selection: String,
}

/// Number of correct attempts.
pub fn score(attempts: &[QuizAttempt]) -> u32 {
    attempts.iter().filter(|a| a.correct).count() as u32
}

/// What a runner needs from a question.
pub trait Question {
    fn word_id(&self) -> &str;
    fn prompt(&self) -> &str;
    fn options(&self) -> &[String];
    fn correct(&self) -> &str;

    fn correct_index(&self) -> Option<usize> {
        self.options().iter().position(|o| o == self.correct())
    }
}

/// Feedback shown between an answer and the advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub selected: usize,
    pub correct_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStep {
    /// The next question is active
    Next,
    /// Last question answered
    Finished { score: u32, attempts: Vec<QuizAttempt> },
}

/// Drives a fixed list of questions, one answer each.
#[derive(Debug, Clone)]
pub struct QuizRun<Q> {
    questions: Vec<Q>,
    current: usize,
    selected: Option<usize>,
    attempts: Vec<QuizAttempt>,
}

impl<Q: Question> QuizRun<Q> {
    pub fn new(questions: Vec<Q>) -> Self {
        Self {
            attempts: Vec::with_capacity(questions.len()),
            questions,
            current: 0,
            selected: None,
        }
    }

    pub fn questions(&self) -> &[Q] {
        &self.questions
    }

    pub fn current(&self) -> Option<&Q> {
        self.questions.get(self.current)
    }

    /// Zero-based index of the active question.
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// True between an answer and the following advance.
    pub fn is_locked(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn attempts(&self) -> &[QuizAttempt] {
        &self.attempts
    }

    pub fn score(&self) -> u32 {
        score(&self.attempts)
    }

    /// Records the answer and locks the question. Ignored (returns `None`)
    /// when already locked, finished, or the index is out of range.
    pub fn answer(&mut self, option_index: usize) -> Option<AnswerFeedback> {
        if self.is_locked() {
            return None;
        }
        let question = self.questions.get(self.current)?;
        let choice = question.options().get(option_index)?;

        let correct = choice == question.correct();
        self.attempts.push(QuizAttempt {
            word_id: question.word_id().to_string(),
            correct,
            user_selection: choice.clone(),
        });
        self.selected = Some(option_index);

        Some(AnswerFeedback {
            correct,
            selected: option_index,
            correct_index: question.correct_index(),
        })
    }

    /// Moves past the locked question. `None` when nothing is locked.
    pub fn advance(&mut self) -> Option<RunStep> {
        self.selected.take()?;

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            Some(RunStep::Next)
        } else {
            self.current = self.questions.len();
            Some(RunStep::Finished {
                score: self.score(),
                attempts: self.attempts.clone(),
            })
        }
    }
}
