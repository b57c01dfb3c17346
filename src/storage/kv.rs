//! Key-value persistence
//!
//! The progress ledger only needs string keys and string values. Production
//! uses the `kv_store` table; tests and throwaway sessions use the in-memory map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::storage::{StorageError, StorageResult};

/// Durable string store scoped to the installing client.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}

// ============================================================
// SQLite
// ============================================================

pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValueStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

// ============================================================
// In-memory
// ============================================================

/// Map-backed store. Can be switched to reject writes, which is how a full
/// disk or revoked storage permission looks to the ledger.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    fn entries(&self) -> StorageResult<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only.load(Ordering::Acquire) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "key-value store is read-only",
            )));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseManager;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("chandrama_pref_lang", "hindi").unwrap();
        assert_eq!(store.get("chandrama_pref_lang").unwrap().as_deref(), Some("hindi"));

        store.set("chandrama_pref_lang", "nepali").unwrap();
        assert_eq!(store.get("chandrama_pref_lang").unwrap().as_deref(), Some("nepali"));
    }

    #[test]
    fn test_sqlite_store() {
        let db = DatabaseManager::in_memory().unwrap();
        exercise(&db.kv_store());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryKeyValueStore::new());
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        {
            let db = DatabaseManager::new(&path).unwrap();
            db.kv_store().set("chandrama_elite_v2", "{}").unwrap();
        }

        let db = DatabaseManager::new(&path).unwrap();
        assert_eq!(
            db.kv_store().get("chandrama_elite_v2").unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_memory_store_read_only() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").unwrap();
        store.set_read_only(true);

        assert!(store.set("a", "2").is_err());
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }
}
