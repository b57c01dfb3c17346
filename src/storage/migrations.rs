//! Database migrations
//!
//! Keeps the SQLite schema in step with the crate version.
//!
//! ## Strategy
//! - each migration runs in its own transaction
//! - applied versions are recorded in `schema_migrations`

use std::collections::BTreeSet;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{error, info};

use crate::storage::{StorageError, StorageResult};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// A single schema migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(version: i32, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// All migrations, ordered by version.
pub fn get_migrations() -> Vec<Migration> {
    vec![
        // V1: content index and key-value store
        Migration::new(
            1,
            "vocabulary and kv_store",
            r#"
            CREATE TABLE IF NOT EXISTS vocabulary (
                id TEXT PRIMARY KEY,
                word TEXT NOT NULL,
                pronunciation TEXT NOT NULL DEFAULT '',
                meaning TEXT NOT NULL,
                english_sentence TEXT NOT NULL DEFAULT '',
                native_sentence TEXT NOT NULL DEFAULT '',
                synonym TEXT,
                language TEXT NOT NULL,
                level TEXT NOT NULL,
                day INTEGER NOT NULL,
                sort_order INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        ),
        // V2: daily batch lookup
        Migration::new(
            2,
            "daily batch index",
            r#"
            CREATE INDEX IF NOT EXISTS idx_vocabulary_track_day
                ON vocabulary(language, level, day, sort_order);
            "#,
        ),
    ]
}

fn ensure_migrations_table(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| StorageError::Migration(format!("failed to create schema_migrations: {}", e)))
}

fn applied_versions(conn: &Connection) -> StorageResult<BTreeSet<i32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<BTreeSet<i32>, _>>()?;
    Ok(versions)
}

/// Highest applied version, 0 on a fresh database.
pub fn schema_version(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;
    Ok(applied_versions(conn)?.last().copied().unwrap_or(0))
}

/// Applies every migration not yet recorded and returns the resulting
/// schema version.
pub fn run_migrations(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;
    let mut applied = applied_versions(conn)?;

    for migration in get_migrations() {
        if applied.contains(&migration.version) {
            continue;
        }
        info!(version = migration.version, name = %migration.name, "running migration");
        apply(conn, &migration).map_err(|e| {
            error!(version = migration.version, error = %e, "migration failed");
            e
        })?;
        applied.insert(migration.version);
    }

    Ok(applied.last().copied().unwrap_or(0))
}

/// Runs one migration and records it. Nothing is kept unless both succeed.
fn apply(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch(&migration.sql)
        .map_err(|e| StorageError::Migration(format!("migration v{} failed: {}", migration.version, e)))?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![migration.version, migration.name, chrono::Utc::now().timestamp()],
    )?;
    tx.commit()?;
    Ok(())
}
