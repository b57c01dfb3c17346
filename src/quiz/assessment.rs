//! Final assessment
//!
//! The batch is shuffled into session order and question `i` takes the type
//! at `ROTATION[i % 5]`. Building the questions from a given order is pure;
//! randomness only enters through the order and the option shuffle.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::Question;
use crate::storage::{Language, Word};

/// Distractors per question when the batch allows it.
const DISTRACTORS: usize = 3;
const BLANK: &str = "_____";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalQuestionType {
    MeaningMatch,
    FillBlank,
    SentenceCompletion,
    SynonymLogic,
    TranslationVerify,
}

impl FinalQuestionType {
    pub const ROTATION: [FinalQuestionType; 5] = [
        FinalQuestionType::MeaningMatch,
        FinalQuestionType::FillBlank,
        FinalQuestionType::SentenceCompletion,
        FinalQuestionType::SynonymLogic,
        FinalQuestionType::TranslationVerify,
    ];

    pub fn for_position(position: usize) -> Self {
        Self::ROTATION[position % Self::ROTATION.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalQuestionType::MeaningMatch => "meaning-match",
            FinalQuestionType::FillBlank => "fill-blank",
            FinalQuestionType::SentenceCompletion => "sentence-completion",
            FinalQuestionType::SynonymLogic => "synonym-logic",
            FinalQuestionType::TranslationVerify => "translation-verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalQuestion {
    #[serde(rename = "type")]
    pub kind: FinalQuestionType,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: String,
    pub word_id: String,
}

impl Question for FinalQuestion {
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

/// Shuffles the batch, assigns types by rotation and shuffles each option set.
pub fn build_final_assessment<R: Rng + ?Sized>(
    batch: &[Word],
    language: Language,
    rng: &mut R,
) -> Vec<FinalQuestion> {
    let mut order: Vec<&Word> = batch.iter().collect();
    order.shuffle(rng);

    let mut questions = assemble_questions(&order, batch, language);
    for question in &mut questions {
        question.options.shuffle(rng);
    }
    questions
}

/// One question per word of `order`. Options come back unshuffled, correct
/// answer first.
pub fn assemble_questions(order: &[&Word], batch: &[Word], language: Language) -> Vec<FinalQuestion> {
    order
        .iter()
        .enumerate()
        .map(|(position, word)| question_for(FinalQuestionType::for_position(position), word, batch, language))
        .collect()
}

fn question_for(kind: FinalQuestionType, word: &Word, batch: &[Word], language: Language) -> FinalQuestion {
    let (prompt, correct, options) = match kind {
        FinalQuestionType::MeaningMatch => (
            format!("Which {} word means \"{}\"?", language.display_name(), word.word),
            word.meaning.clone(),
            with_distractors(&word.meaning, word, batch, |w| Some(w.meaning.as_str())),
        ),
        FinalQuestionType::FillBlank => (
            format!("Fill in the blank: \"{}\"", mask_word(&word.english_sentence, &word.word)),
            word.word.clone(),
            with_distractors(&word.word, word, batch, |w| Some(w.word.as_str())),
        ),
        FinalQuestionType::SentenceCompletion => (
            format!("Which English word fits \"{}\"?", word.native_sentence),
            word.word.clone(),
            with_distractors(&word.word, word, batch, |w| Some(w.word.as_str())),
        ),
        FinalQuestionType::SynonymLogic => match word.synonym.as_deref() {
            Some(synonym) => (
                format!("Closest synonym of \"{}\":", word.word),
                synonym.to_string(),
                with_distractors(synonym, word, batch, |w| w.synonym.as_deref()),
            ),
            // no synonym on record: ask for the meaning instead
            None => (
                format!("Closest {} sense of \"{}\":", language.display_name(), word.word),
                word.meaning.clone(),
                with_distractors(&word.meaning, word, batch, |w| Some(w.meaning.as_str())),
            ),
        },
        FinalQuestionType::TranslationVerify => (
            format!("Which sentence uses \"{}\" correctly?", word.word),
            word.english_sentence.clone(),
            with_distractors(&word.english_sentence, word, batch, |w| Some(w.english_sentence.as_str())),
        ),
    };

    FinalQuestion {
        kind,
        prompt,
        options,
        correct,
        word_id: word.id.clone(),
    }
}

/// `correct` followed by the same field of up to three other words, in batch
/// order. Blanks and values equal to `correct` are skipped.
fn with_distractors<'a, F>(correct: &str, word: &Word, batch: &'a [Word], field: F) -> Vec<String>
where
    F: Fn(&'a Word) -> Option<&'a str>,
{
    let mut options = vec![correct.to_string()];
    for value in batch
        .iter()
        .filter(|other| other.id != word.id)
        .filter_map(field)
        .filter(|value| !value.trim().is_empty() && *value != correct)
    {
        if options.len() > DISTRACTORS {
            break;
        }
        if !options.iter().any(|o| o == value) {
            options.push(value.to_string());
        }
    }
    options
}

/// Replaces whole-word, case-insensitive occurrences of `word` with a blank.
pub fn mask_word(sentence: &str, word: &str) -> String {
    if word.trim().is_empty() {
        return sentence.to_string();
    }

    let pattern = format!(r"\b{}\b", regex::escape(word.trim()));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => replace_all(&re, sentence),
        Err(_) => sentence.to_string(),
    }
}

fn replace_all(re: &Regex, sentence: &str) -> String {
    re.replace_all(sentence, BLANK).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn word(i: usize, term: &str, synonym: Option<&str>) -> Word {
        Word {
            id: format!("w{}", i),
            word: term.to_string(),
            pronunciation: String::new(),
            meaning: format!("meaning-{}", term),
            english_sentence: format!("I saw the {} today.", term.to_lowercase()),
            native_sentence: format!("native sentence {}", i),
            synonym: synonym.map(str::to_string),
        }
    }

    fn batch() -> Vec<Word> {
        vec![
            word(0, "Brave", Some("bold")),
            word(1, "Calm", Some("peaceful")),
            word(2, "Eager", Some("keen")),
            word(3, "Vast", Some("huge")),
            word(4, "Swift", Some("fast")),
        ]
    }

    #[test]
    fn test_one_question_per_word_with_rotation() {
        let words = batch();

        for seed in 0..16 {
            let questions = build_final_assessment(&words, Language::Nepali, &mut ChaCha8Rng::seed_from_u64(seed));
            assert_eq!(questions.len(), 5);

            let kinds: Vec<_> = questions.iter().map(|q| q.kind).collect();
            assert_eq!(kinds, FinalQuestionType::ROTATION.to_vec());

            let ids: HashSet<_> = questions.iter().map(|q| q.word_id.as_str()).collect();
            assert_eq!(ids.len(), 5);
        }
    }

    #[test]
    fn test_correct_answer_per_type() {
        let words = batch();
        let order: Vec<&Word> = words.iter().collect();
        let questions = assemble_questions(&order, &words, Language::Hindi);

        assert_eq!(questions[0].correct, "meaning-Brave");
        assert!(questions[0].prompt.contains("Hindi"));
        assert_eq!(questions[1].correct, "Calm");
        assert_eq!(questions[1].prompt, "Fill in the blank: \"I saw the _____ today.\"");
        assert_eq!(questions[2].correct, "Eager");
        assert!(questions[2].prompt.contains("native sentence 2"));
        assert_eq!(questions[3].correct, "huge");
        assert_eq!(questions[4].correct, "I saw the swift today.");

        for q in &questions {
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.options[0], q.correct);
            assert_eq!(q.options.iter().filter(|o| **o == q.correct).count(), 1);
        }
        assert_eq!(questions[3].options, vec!["huge", "bold", "peaceful", "keen"]);
    }

    #[test]
    fn test_assembly_is_deterministic_for_order() {
        let words = batch();
        let order: Vec<&Word> = words.iter().rev().collect();
        let a = assemble_questions(&order, &words, Language::Nepali);
        let b = assemble_questions(&order, &words, Language::Nepali);
        assert_eq!(a, b);
        assert_eq!(a[0].word_id, "w4");
        assert_eq!(a[0].kind, FinalQuestionType::MeaningMatch);
    }

    #[test]
    fn test_options_shuffled_keep_membership() {
        let words = batch();
        let questions = build_final_assessment(&words, Language::Nepali, &mut ChaCha8Rng::seed_from_u64(11));
        for q in &questions {
            assert!(q.options.contains(&q.correct));
            assert_eq!(q.correct_index().map(|i| &q.options[i]), Some(&q.correct));
        }
    }

    #[test]
    fn test_missing_synonym_falls_back_to_meaning() {
        let words = vec![
            word(0, "Brave", None),
            word(1, "Calm", None),
            word(2, "Eager", Some("keen")),
        ];
        let w = &words[0];
        let q = question_for(FinalQuestionType::SynonymLogic, w, &words, Language::Nepali);
        assert_eq!(q.kind, FinalQuestionType::SynonymLogic);
        assert_eq!(q.correct, "meaning-Brave");
        assert_eq!(q.options.len(), 3);

        let q = question_for(FinalQuestionType::SynonymLogic, &words[2], &words, Language::Nepali);
        assert_eq!(q.correct, "keen");
        // other words have no synonym to borrow
        assert_eq!(q.options, vec!["keen"]);
    }

    #[test]
    fn test_small_batch_has_fewer_options() {
        let words = vec![word(0, "Brave", Some("bold")), word(1, "Calm", Some("peaceful"))];
        let questions = build_final_assessment(&words, Language::Hindi, &mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.options.len() == 2));
    }

    #[test]
    fn test_mask_word_whole_word_case_insensitive() {
        assert_eq!(
            mask_word("Run, run! The runner runs to run.", "run"),
            "_____, _____! The runner runs to _____."
        );
        assert_eq!(mask_word("Nothing here.", "absent"), "Nothing here.");
        assert_eq!(mask_word("a.b is not ab", "a.b"), "_____ is not ab");
    }

    #[test]
    fn test_type_serializes_kebab_case() {
        let json = serde_json::to_value(FinalQuestionType::SentenceCompletion).unwrap();
        assert_eq!(json, "sentence-completion");
        assert_eq!(FinalQuestionType::for_position(8), FinalQuestionType::SynonymLogic);
    }
}
