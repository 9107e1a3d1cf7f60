//! Durable key-value tier backed by SQLite
//!
//! Rows are addressed by the `(name, version_key)` primary key and carry an
//! `updated_at` stamp. The durable tier is authoritative: nothing here ever
//! expires or evicts entries.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Key-value collaborator for the durable cache tier: transactional upsert
/// by `(name, version_key)` plus full iteration for startup rehydration.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn upsert(&self, name: &str, version_key: &str, payload: &str) -> Result<(), StoreError>;

    async fn fetch(&self, name: &str, version_key: &str) -> Result<Option<String>, StoreError>;

    async fn load_all(&self) -> Result<Vec<(String, String, String)>, StoreError>;
}

/// SQLite-backed durable store. One table per logical cache.
///
/// All access goes through a single fair mutex; rusqlite calls are quick
/// single-row operations, so holding the lock across them is fine.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: &'static str,
}

impl SqliteStore {
    /// Open (or create) a store at `path` using the given table.
    pub fn open(path: &Path, table: &'static str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn, table)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            table,
        })
    }

    /// Open an in-memory store. Used by tests and cache-less runs.
    pub fn open_in_memory(table: &'static str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn, table)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            table,
        })
    }

    fn init_schema(conn: &Connection, table: &'static str) -> Result<(), StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                name        TEXT NOT NULL,
                version_key TEXT NOT NULL,
                payload     TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (name, version_key)
            );"
        ))?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn upsert(&self, name: &str, version_key: &str, payload: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, version_key, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (name, version_key)
                 DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                self.table
            ),
            params![name, version_key, payload, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn fetch(&self, name: &str, version_key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT payload FROM {} WHERE name = ?1 AND version_key = ?2",
            self.table
        ))?;
        let mut rows = stmt.query(params![name, version_key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<(String, String, String)>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT name, version_key, payload FROM {}",
            self.table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_and_fetch() {
        let store = SqliteStore::open_in_memory("metadata").unwrap();

        store.upsert("lodash", "*", "{\"a\":1}").await.unwrap();
        let payload = store.fetch("lodash", "*").await.unwrap();
        assert_eq!(payload.as_deref(), Some("{\"a\":1}"));

        // Upsert replaces by primary key
        store.upsert("lodash", "*", "{\"a\":2}").await.unwrap();
        let payload = store.fetch("lodash", "*").await.unwrap();
        assert_eq!(payload.as_deref(), Some("{\"a\":2}"));
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = SqliteStore::open_in_memory("metadata").unwrap();
        assert!(store.fetch("nope", "*").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tags_are_distinct_keys() {
        let store = SqliteStore::open_in_memory("metadata").unwrap();
        store.upsert("react", "*", "all").await.unwrap();
        store.upsert("react", "^18.0.0", "tagged").await.unwrap();

        assert_eq!(store.fetch("react", "*").await.unwrap().as_deref(), Some("all"));
        assert_eq!(
            store.fetch("react", "^18.0.0").await.unwrap().as_deref(),
            Some("tagged")
        );
    }

    #[tokio::test]
    async fn test_load_all() {
        let store = SqliteStore::open_in_memory("vulns").unwrap();
        store.upsert("a", "1.0.0", "[]").await.unwrap();
        store.upsert("b", "2.0.0", "[]").await.unwrap();

        let mut all = store.load_all().await.unwrap();
        all.sort();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "a");
        assert_eq!(all[1].0, "b");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = SqliteStore::open(&path, "metadata").unwrap();
            store.upsert("lodash", "*", "payload").await.unwrap();
        }

        let store = SqliteStore::open(&path, "metadata").unwrap();
        assert_eq!(
            store.fetch("lodash", "*").await.unwrap().as_deref(),
            Some("payload")
        );
    }
}
