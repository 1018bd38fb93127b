pub mod kv;
pub mod processed;

pub use processed::ProcessedIds;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Thread-safe SQLite store for processed update ids and command state.
///
/// Command state follows a small set of key-addressed structures (plain
/// values, sets, lists and hashes), namespaced by key prefix such as
/// `bot:gifs:<name>`.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- Dedup ledger
            CREATE TABLE IF NOT EXISTS processed_updates (
                update_id INTEGER PRIMARY KEY,
                processed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Plain string values
            CREATE TABLE IF NOT EXISTS kv_values (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Unordered sets of unique members
            CREATE TABLE IF NOT EXISTS kv_sets (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (key, member)
            );

            -- Lists; lpush prepends, so the newest row has the highest seq
            CREATE TABLE IF NOT EXISTS kv_lists (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_kv_lists_key ON kv_lists(key, seq);

            -- Hashes of field -> value
            CREATE TABLE IF NOT EXISTS kv_hashes (
                key TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, field)
            );
            ",
        )
        .context("Failed to run store migrations")?;

        Ok(())
    }

    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Close the connection if this is the last handle to it.
    ///
    /// Returns `false` when other handles are still alive; the connection
    /// then closes when the last of them is dropped.
    pub fn close(self) -> Result<bool> {
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => {
                conn.into_inner()
                    .close()
                    .map_err(|(_, e)| e)
                    .context("Failed to close database")?;
                info!("Store closed");
                Ok(true)
            }
            Err(_) => {
                debug!("Store still shared, leaving the connection open");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");

        {
            let store = Store::open(&path).unwrap();
            store.set("bot:imgur:client", "abc").await.unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(
            store.get("bot:imgur:client").await.unwrap().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        Store::run_migrations(&conn).unwrap();
        Store::run_migrations(&conn).unwrap();
    }

    #[tokio::test]
    async fn test_close_waits_for_last_handle() {
        let store = Store::open_in_memory().unwrap();
        let other = store.clone();

        assert!(!store.close().unwrap());
        other.set("k", "v").await.unwrap();
        assert!(other.close().unwrap());
    }
}
