//! Content packs
//!
//! A pack is the JSON form of one track's word list. Words are grouped into
//! days by position: five per day, in file order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::models::{Language, Level, Track};
use crate::storage::StorageResult;

/// One track's word list as shipped with the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPack {
    pub language: Language,
    pub level: Level,
    pub words: Vec<ContentWord>,
}

/// A word as written in a pack. `id` is derived when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentWord {
    #[serde(default)]
    pub id: Option<String>,
    pub word: String,
    #[serde(default)]
    pub pronunciation: String,
    pub meaning: String,
    #[serde(default)]
    pub english_sentence: String,
    #[serde(default)]
    pub native_sentence: String,
    #[serde(default)]
    pub synonym: Option<String>,
}

impl ContentWord {
    /// Pack id if given, else `<language>_<level>_<word>` with whitespace runs
    /// replaced by `_` and lowercased.
    pub fn resolve_id(&self, track: Track) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let slug = self
                    .word
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_")
                    .to_lowercase();
                format!("{}_{}_{}", track.language, track.level, slug)
            }
        }
    }
}

impl ContentPack {
    pub fn track(&self) -> Track {
        Track::new(self.language, self.level)
    }

    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Loads every `*.json` pack in `dir`, ordered by file name.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> StorageResult<Vec<Self>> {
        let mut paths = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        paths.sort();

        let mut packs = Vec::with_capacity(paths.len());
        for path in paths {
            let pack = Self::from_file(&path)?;
            debug!(path = %path.display(), track = %pack.track(), words = pack.words.len(), "loaded content pack");
            packs.push(pack);
        }
        Ok(packs)
    }
}

/// Outcome of a seeding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Tracks that received rows in this pass
    pub seeded_tracks: Vec<Track>,
    /// Tracks that already had content and were left alone
    pub skipped_tracks: Vec<Track>,
    /// Rows actually inserted
    pub inserted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_id_derives_slug() {
        let word = ContentWord {
            word: "Make  Up".into(),
            meaning: "मिलाउनु".into(),
            ..Default::default()
        };
        let track = Track::new(Language::Nepali, Level::Beginner);
        assert_eq!(word.resolve_id(track), "nepali_beginner_make_up");
    }

    #[test]
    fn test_resolve_id_keeps_explicit() {
        let word = ContentWord {
            id: Some("hi-adv-001".into()),
            word: "Ephemeral".into(),
            ..Default::default()
        };
        let track = Track::new(Language::Hindi, Level::Advanced);
        assert_eq!(word.resolve_id(track), "hi-adv-001");
    }

    #[test]
    fn test_pack_from_json() {
        let pack = ContentPack::from_json_str(
            r#"{
                "language": "hindi",
                "level": "beginner",
                "words": [
                    {"word": "Apple", "meaning": "सेब", "synonym": "fruit"},
                    {"word": "Book", "meaning": "किताब"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(pack.track(), Track::new(Language::Hindi, Level::Beginner));
        assert_eq!(pack.words.len(), 2);
        assert_eq!(pack.words[0].synonym.as_deref(), Some("fruit"));
        assert!(pack.words[1].pronunciation.is_empty());
    }

    #[test]
    fn test_load_dir_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b_hindi.json"),
            r#"{"language":"hindi","level":"beginner","words":[]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a_nepali.json"),
            r#"{"language":"nepali","level":"advanced","words":[]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let packs = ContentPack::load_dir(dir.path()).unwrap();
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].language, Language::Nepali);
        assert_eq!(packs[1].language, Language::Hindi);
    }

    #[test]
    fn test_load_dir_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(ContentPack::load_dir(dir.path()).is_err());
    }
}
