use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Store;

const FLOOR_KEY: &str = "bot:updates:floor";

/// Dedup ledger of processed update ids.
///
/// Hydrated fully from the store at startup; every insert is persisted before
/// it is recorded in memory. With a retention window, ids older than the
/// window are pruned and everything at or below the pruned watermark still
/// counts as processed.
pub struct ProcessedIds {
    conn: Arc<Mutex<Connection>>,
    ids: BTreeSet<i64>,
    floor: Option<i64>,
    retain: Option<usize>,
}

impl ProcessedIds {
    pub async fn load(store: &Store, retain: Option<usize>) -> Result<Self> {
        let conn = store.connection();

        let (ids, floor) = {
            let guard = conn.lock().await;
            let mut stmt = guard.prepare("SELECT update_id FROM processed_updates")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<BTreeSet<i64>>>()
                .context("Failed to load processed update ids")?;

            let floor: Option<String> = guard
                .query_row(
                    "SELECT value FROM kv_values WHERE key = ?1",
                    rusqlite::params![FLOOR_KEY],
                    |row| row.get(0),
                )
                .optional()?;

            (ids, floor.and_then(|f| f.parse().ok()))
        };

        debug!(
            "Loaded {} processed update ids (floor: {:?})",
            ids.len(),
            floor
        );

        Ok(Self {
            conn,
            ids,
            floor,
            retain: retain.filter(|r| *r > 0),
        })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.floor.is_some_and(|floor| id <= floor) || self.ids.contains(&id)
    }

    /// Persist `id`, then mark it in memory.
    ///
    /// Only the write of `id` itself can fail the call. Once it is recorded,
    /// a failed prune is logged and retried on the next insert.
    pub async fn insert(&mut self, id: i64) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT OR IGNORE INTO processed_updates (update_id) VALUES (?1)",
                rusqlite::params![id],
            )
            .with_context(|| format!("Failed to persist processed update {}", id))?;
        }

        self.ids.insert(id);

        if let Err(e) = self.prune().await {
            warn!("Failed to prune processed update ids: {:#}", e);
        }

        Ok(())
    }

    /// Highest processed id seen so far.
    pub fn max(&self) -> Option<i64> {
        self.ids.last().copied().or(self.floor)
    }

    /// Offset for the next `getUpdates` call.
    pub fn next_offset(&self) -> Option<i64> {
        self.max().map(|id| id + 1)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    async fn prune(&mut self) -> Result<()> {
        let Some(retain) = self.retain else {
            return Ok(());
        };
        if self.ids.len() <= retain {
            return Ok(());
        }

        let excess = self.ids.len() - retain;
        let Some(watermark) = self.ids.iter().nth(excess - 1).copied() else {
            return Ok(());
        };

        {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM processed_updates WHERE update_id <= ?1",
                rusqlite::params![watermark],
            )
            .context("Failed to prune processed update ids")?;
            tx.execute(
                "INSERT INTO kv_values (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![FLOOR_KEY, watermark.to_string()],
            )
            .context("Failed to store processed update floor")?;
            tx.commit()?;
        }

        self.ids = self.ids.split_off(&(watermark + 1));
        self.floor = Some(watermark);
        debug!("Pruned processed update ids up to {}", watermark);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_ledger_has_no_offset() {
        let store = Store::open_in_memory().unwrap();
        let ids = ProcessedIds::load(&store, None).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(ids.next_offset(), None);
    }

    #[tokio::test]
    async fn test_offset_follows_highest_id() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = ProcessedIds::load(&store, None).await.unwrap();

        for id in [3, 7, 5] {
            ids.insert(id).await.unwrap();
        }

        assert_eq!(ids.max(), Some(7));
        assert_eq!(ids.next_offset(), Some(8));
        assert!(ids.contains(5));
        assert!(!ids.contains(4));
    }

    #[tokio::test]
    async fn test_hydrates_from_store() {
        let store = Store::open_in_memory().unwrap();
        {
            let mut ids = ProcessedIds::load(&store, None).await.unwrap();
            ids.insert(10).await.unwrap();
            ids.insert(11).await.unwrap();
        }

        let ids = ProcessedIds::load(&store, None).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(10));
        assert_eq!(ids.next_offset(), Some(12));
    }

    #[tokio::test]
    async fn test_retention_prunes_oldest_and_keeps_them_processed() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = ProcessedIds::load(&store, Some(2)).await.unwrap();

        for id in 1..=5 {
            ids.insert(id).await.unwrap();
        }

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(1));
        assert!(ids.contains(3));
        assert_eq!(ids.next_offset(), Some(6));

        let reloaded = ProcessedIds::load(&store, Some(2)).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(2));
        assert!(!reloaded.contains(6));
    }

    #[tokio::test]
    async fn test_failed_prune_keeps_rows_and_insert_succeeds() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = ProcessedIds::load(&store, Some(2)).await.unwrap();
        ids.insert(1).await.unwrap();
        ids.insert(2).await.unwrap();

        store
            .connection()
            .lock()
            .await
            .execute_batch("DROP TABLE kv_values")
            .unwrap();

        ids.insert(3).await.unwrap();

        assert!(ids.contains(1));
        assert!(ids.contains(3));
        assert_eq!(ids.next_offset(), Some(4));

        let conn = store.connection();
        let conn = conn.lock().await;
        let persisted: Vec<i64> = conn
            .prepare("SELECT update_id FROM processed_updates ORDER BY update_id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(persisted, vec![1, 2, 3]);
    }
}
