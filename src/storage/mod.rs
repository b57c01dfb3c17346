//! SQLite local storage
//!
//! Holds everything that survives a reload:
//! - the vocabulary content index (seeded once from content packs)
//! - the key-value store backing the progress ledger
//! - schema migrations for both

// ============================================================
// Submodules
// ============================================================

pub mod content;
pub mod kv;
pub mod migrations;
pub mod models;
pub mod word;

// ============================================================
// Re-exports
// ============================================================

pub use content::{ContentPack, ContentWord, SeedReport};
pub use kv::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use migrations::run_migrations;
pub use models::*;
pub use word::{ContentStore, WordRepository};

// ============================================================
// Imports
// ============================================================

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

// ============================================================
// Errors
// ============================================================

/// Storage layer error
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("content store is not initialized")]
    StoreUnavailable,

    #[error("failed to acquire lock: {0}")]
    LockError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// DatabaseManager - connection owner
// ============================================================

/// Owns the single SQLite connection shared by the repositories.
pub struct DatabaseManager {
    connection: Arc<Mutex<Connection>>,
    db_path: String,
}

impl DatabaseManager {
    /// Opens (or creates) the database file and runs pending migrations.
    ///
    /// # Arguments
    /// * `db_path` - database file path; parent directories are created
    ///
    /// # Example
    /// ```ignore
    /// let db = DatabaseManager::new("./data/chandrama.db")?;
    /// ```
    pub fn new<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection = Connection::open(path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA cache_size=-16000;",
        )?;

        let manager = Self {
            connection: Arc::new(Mutex::new(connection)),
            db_path: path.to_string_lossy().to_string(),
        };
        manager.initialize()?;

        Ok(manager)
    }

    /// In-memory database for tests. No WAL.
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;

        let manager = Self {
            connection: Arc::new(Mutex::new(connection)),
            db_path: ":memory:".to_string(),
        };
        manager.initialize()?;

        Ok(manager)
    }

    /// Runs migrations up to the current schema version.
    pub fn initialize(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        migrations::run_migrations(&conn)?;
        Ok(())
    }

    /// Shared handle for repositories.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.connection)
    }

    pub fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Word repository over this connection.
    pub fn word_repository(&self) -> WordRepository {
        WordRepository::new(self.connection())
    }

    /// Key-value store over this connection.
    pub fn kv_store(&self) -> SqliteKeyValueStore {
        SqliteKeyValueStore::new(self.connection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_manager_runs_migrations() {
        let db = DatabaseManager::in_memory().expect("in-memory db");
        let conn = db.get_connection().unwrap();
        assert_eq!(
            migrations::schema_version(&conn).unwrap(),
            migrations::CURRENT_SCHEMA_VERSION
        );
        assert_eq!(db.db_path(), ":memory:");
    }

    #[test]
    fn test_file_manager_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chandrama.db");

        let db = DatabaseManager::new(&path).expect("file db");
        assert!(path.exists());
        assert!(db.db_path().ends_with("chandrama.db"));
    }
}
