//! Translation drill
//!
//! One question per word, in batch order: the word's meaning plus up to three
//! distinct meanings of other words in the batch, shuffled.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::Question;
use crate::storage::Word;

/// Options per question when the batch allows it.
pub const MCQ_OPTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqQuestion {
    pub word_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: String,
}

impl Question for McqQuestion {
    fn word_id(&self) -> &str {
        &self.word_id
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn correct(&self) -> &str {
        &self.correct
    }
}

/// Option set for `word`: its meaning and up to three other distinct meanings
/// drawn without replacement, in random order.
pub fn build_options<R: Rng + ?Sized>(word: &Word, batch: &[Word], rng: &mut R) -> Vec<String> {
    let mut seen = HashSet::new();
    let pool: Vec<&str> = batch
        .iter()
        .filter(|other| other.id != word.id)
        .map(|other| other.meaning.as_str())
        .filter(|meaning| *meaning != word.meaning && seen.insert(*meaning))
        .collect();

    let mut options: Vec<String> = pool
        .choose_multiple(rng, MCQ_OPTIONS - 1)
        .map(|m| m.to_string())
        .collect();
    options.push(word.meaning.clone());
    options.shuffle(rng);
    options
}

/// Questions for the whole batch, in batch order.
pub fn build_mcq<R: Rng + ?Sized>(batch: &[Word], rng: &mut R) -> Vec<McqQuestion> {
    batch
        .iter()
        .map(|word| McqQuestion {
            word_id: word.id.clone(),
            prompt: format!("Translate: \"{}\"", word.word),
            options: build_options(word, batch, rng),
            correct: word.meaning.clone(),
        })
        .collect()
}
