//! Local relational store: connection helpers, schema management, the
//! generic bulk persister, and the company repositories.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub mod models;
pub mod persister;
pub mod repositories;
pub mod schema;

pub type DbPool = sqlx::SqlitePool;

/// SQLite busy timeout, matching the store's historical 5-second setting.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if missing) the local database file.
///
/// Foreign keys are deliberately left unenforced: master-table references
/// are advisory and reconciled by the orphan-cleanup pass, and child rows
/// must be writable even when their parent has not synced yet.
pub async fn connect(path: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(false);

    SqlitePoolOptions::new().connect_with(options).await
}

/// Open an in-memory database for tests.
///
/// Pinned to a single pooled connection so every caller sees the same
/// in-memory database for the pool's lifetime.
pub async fn connect_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(false);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}
