//! Vocabulary content index
//!
//! Resolves `(language, level, day)` to the day's batch and seeds the index
//! from content packs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::storage::content::{ContentPack, SeedReport};
use crate::storage::models::{Language, Level, Track, Word};
use crate::storage::{StorageError, StorageResult};

/// Words per daily batch.
pub const WORDS_PER_DAY: usize = 5;

/// Read side of the content index, as seen by the session.
pub trait ContentStore: Send + Sync {
    /// The day's batch in content order, at most [`WORDS_PER_DAY`] entries.
    /// Empty when the day has no content.
    fn fetch_daily_words(&self, language: Language, level: Level, day: u32) -> StorageResult<Vec<Word>>;
}

/// SQLite-backed content index.
///
/// Fetches fail with [`StorageError::StoreUnavailable`] until a seeding pass
/// (or [`WordRepository::mark_ready`]) has completed.
pub struct WordRepository {
    conn: Arc<Mutex<Connection>>,
    ready: AtomicBool,
}

impl WordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            ready: AtomicBool::new(false),
        }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the index as initialised without seeding (content already on disk).
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    // ============================================================
    // Seeding
    // ============================================================

    /// Seeds every pack whose track has no rows yet, then marks the index ready.
    pub fn seed_all(&self, packs: &[ContentPack]) -> StorageResult<SeedReport> {
        let mut report = SeedReport::default();

        for pack in packs {
            let track = pack.track();
            if self.track_word_count(track)? > 0 {
                report.skipped_tracks.push(track);
                continue;
            }

            let inserted = self.import_content(pack)?;
            report.inserted += inserted;
            report.seeded_tracks.push(track);
        }

        self.mark_ready();
        info!(
            seeded = report.seeded_tracks.len(),
            skipped = report.skipped_tracks.len(),
            inserted = report.inserted,
            "content index ready"
        );
        Ok(report)
    }

    /// Imports one pack in a single transaction. Existing ids are left
    /// untouched, so re-importing never duplicates.
    ///
    /// # Returns
    /// * `StorageResult<usize>` - rows actually inserted
    pub fn import_content(&self, pack: &ContentPack) -> StorageResult<usize> {
        let track = pack.track();
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO vocabulary (
                    id, word, pronunciation, meaning, english_sentence,
                    native_sentence, synonym, language, level, day, sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;

            for (index, item) in pack.words.iter().enumerate() {
                let day = (index / WORDS_PER_DAY) as u32 + 1;
                inserted += stmt.execute(params![
                    item.resolve_id(track),
                    item.word,
                    item.pronunciation,
                    item.meaning,
                    item.english_sentence,
                    item.native_sentence,
                    item.synonym,
                    track.language.as_str(),
                    track.level.as_str(),
                    day,
                    index as i64,
                ])?;
            }
        }

        tx.commit()?;

        if inserted < pack.words.len() {
            warn!(
                track = %track,
                ignored = pack.words.len() - inserted,
                "content import skipped existing ids"
            );
        }
        Ok(inserted)
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn track_word_count(&self, track: Track) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM vocabulary WHERE language = ?1 AND level = ?2",
            params![track.language.as_str(), track.level.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn total_word_count(&self) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM vocabulary", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Word counts keyed by `<level>_<language>`.
    pub fn detailed_stats(&self) -> StorageResult<BTreeMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT LOWER(level || '_' || language), COUNT(*)
            FROM vocabulary
            GROUP BY level, language
            "#,
        )?;

        let stats = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(stats)
    }
}

impl ContentStore for WordRepository {
    fn fetch_daily_words(&self, language: Language, level: Level, day: u32) -> StorageResult<Vec<Word>> {
        if !self.is_ready() {
            return Err(StorageError::StoreUnavailable);
        }

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, word, pronunciation, meaning, english_sentence,
                   native_sentence, synonym
            FROM vocabulary
            WHERE language = ?1 AND level = ?2 AND day = ?3
            ORDER BY sort_order ASC
            LIMIT ?4
            "#,
        )?;

        let words = stmt
            .query_map(
                params![language.as_str(), level.as_str(), day, WORDS_PER_DAY as i64],
                |row| Word::from_row(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(words)
    }
}
