use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use rusqlite::{Connection, params, OptionalExtension};
use serde_json::Value;
use service_registry::cache::expires_at;
use service_registry::{CacheError, CacheStore, Clock, SystemClock};

/// SQLite-backed cache store and settings table.
pub struct CacheDb {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl CacheDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_items (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache_items(expires_at);

            CREATE TABLE IF NOT EXISTS config (
                name   TEXT PRIMARY KEY,
                value  TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn, clock })
    }

    /// All configuration rows, in insertion order.
    pub fn settings(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM config ORDER BY rowid")
            .context("Failed to prepare query")?;

        let settings: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to query settings")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect settings")?;

        Ok(settings)
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

fn backend(e: rusqlite::Error) -> CacheError {
    CacheError::Backend(Box::new(e))
}

impl CacheStore for CacheDb {
    fn has_item(&self, key: &str) -> Result<bool, CacheError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM cache_items WHERE key = ?1 AND expires_at > ?2",
                params![key, self.now_millis()],
                |_| Ok(()),
            )
            .optional()
            .map_err(backend)?;
        Ok(found.is_some())
    }

    fn get_item(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache_items WHERE key = ?1 AND expires_at > ?2",
                params![key, self.now_millis()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;

        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(CacheError::from)
    }

    fn set_item(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        let expires = expires_at(self.clock.now(), ttl).timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO cache_items (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at",
                params![key, raw, expires],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        let count = self
            .conn
            .execute(
                "DELETE FROM cache_items WHERE expires_at <= ?1",
                params![self.now_millis()],
            )
            .map_err(backend)?;
        Ok(count as u64)
    }
}
