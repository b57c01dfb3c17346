//! Data models
//!
//! Content records and the language/level namespace that partitions both the
//! content index and progress tracking.

use std::fmt;
use std::str::FromStr;

use rusqlite::{Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};

// ============================================================
// Language / Level
// ============================================================

/// Native language the learner studies English from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Nepali,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Nepali, Language::Hindi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Nepali => "nepali",
            Language::Hindi => "hindi",
        }
    }

    /// Name shown in question prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Nepali => "Nepali",
            Language::Hindi => "Hindi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

/// Unknown enum value while parsing a language or level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Language {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNameError {
                kind: "language",
                value: s.to_string(),
            })
    }
}

impl FromStr for Level {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNameError {
                kind: "level",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// Track - (language, level) pair
// ============================================================

/// One progress track: every pointer and history entry is scoped to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Track {
    pub language: Language,
    pub level: Level,
}

impl Track {
    pub fn new(language: Language, level: Level) -> Self {
        Self { language, level }
    }

    /// Key into the ledger's completion history, e.g. `nepali_beginner`.
    pub fn history_key(&self) -> String {
        format!("{}_{}", self.language, self.level)
    }

    /// Dedicated key holding this track's day pointer.
    pub fn pointer_key(&self) -> String {
        format!("chandrama_{}_{}_pointer", self.level, self.language)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.level)
    }
}

// ============================================================
// Word - vocabulary record
// ============================================================

/// Vocabulary record. Never mutated after seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Stable id, unique per language + level + word
    pub id: String,
    /// English term
    pub word: String,
    pub pronunciation: String,
    /// Translation in the learner's language
    pub meaning: String,
    pub english_sentence: String,
    pub native_sentence: String,
    pub synonym: Option<String>,
}

impl Word {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            word: row.get("word")?,
            pronunciation: row.get("pronunciation")?,
            meaning: row.get("meaning")?,
            english_sentence: row.get("english_sentence")?,
            native_sentence: row.get("native_sentence")?,
            synonym: row
                .get::<_, Option<String>>("synonym")?
                .filter(|s| !s.trim().is_empty()),
        })
    }
}
