//! Storage layer for the web time tracker.
//!
//! Provides a durable [`KeyValueStore`] backed by `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The tracker owns exactly one `Database` and drives it from a single task, so no
//! further synchronization is needed.
//!
//! # Schema
//!
//! A single `kv` table maps a key (`dailyData`, `historicalData`,
//! `domainCategories`, `currentDate`) to a JSON document stored as TEXT.
//! Structure inside the documents is owned by `wt-core`; evolving it is a
//! matter for its lenient loaders, not for SQL migrations.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use thiserror::Error;
use wt_core::KeyValueStore;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Size of one stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub key: String,
    pub bytes: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- value: JSON document, e.g. {\"2025-01-15\": {\"total\": {...}, \"hourly\": {...}}}
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Lists stored keys with the size of their documents, ordered by key.
    pub fn key_stats(&self) -> Result<Vec<KeyStats>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, length(value) FROM kv ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let bytes: i64 = row.get(1)?;
            Ok(KeyStats {
                key: row.get(0)?,
                bytes: usize::try_from(bytes).unwrap_or(0),
            })
        })?;
        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }
}

impl KeyValueStore for Database {
    type Error = DbError;

    /// Reads the requested documents; missing keys are absent from the result.
    ///
    /// A document that is not valid JSON reads as `null`, which the core
    /// loaders treat as unreadable and replace on their next write.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, DbError> {
        let mut stmt = self.conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            let Some(raw) = raw else {
                continue;
            };
            let value = serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(%key, %error, "stored document is not valid JSON");
                Value::Null
            });
            values.insert((*key).to_string(), value);
        }
        Ok(values)
    }

    /// Writes all entries in one transaction.
    fn set(&mut self, entries: BTreeMap<String, Value>) -> Result<(), DbError> {
        if entries.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO kv (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )?;
            for (key, value) in &entries {
                stmt.execute(params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        tracing::trace!(keys = entries.len(), "stored documents");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DbError> {
        let removed = self.conn.execute("DELETE FROM kv", [])?;
        tracing::debug!(removed, "cleared store");
        Ok(())
    }
}
