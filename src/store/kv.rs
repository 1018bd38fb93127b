use anyhow::{Context, Result};
use rusqlite::OptionalExtension;

use super::Store;

impl Store {
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT value FROM kv_values WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read key {}", key))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv_values (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )
        .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }

    /// Atomic conditional set. Returns false when the key already held a value.
    pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO kv_values (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .with_context(|| format!("Failed to write key {}", key))?;
        Ok(rows > 0)
    }

    /// Remove a key from every structure it may live in.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        for table in ["kv_values", "kv_sets", "kv_lists", "kv_hashes"] {
            conn.execute(
                &format!("DELETE FROM {} WHERE key = ?1", table),
                rusqlite::params![key],
            )
            .with_context(|| format!("Failed to delete key {} from {}", key, table))?;
        }
        Ok(())
    }

    /// Add members to a set, returning how many were new.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?1, ?2)")?;
            for member in members {
                added += stmt.execute(rusqlite::params![key, member])?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to add members to set {}", key))?;
        Ok(added)
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute(
                "DELETE FROM kv_sets WHERE key = ?1 AND member = ?2",
                rusqlite::params![key, member],
            )
            .with_context(|| format!("Failed to remove member from set {}", key))?;
        Ok(rows > 0)
    }

    /// All members of a set, sorted.
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT member FROM kv_sets WHERE key = ?1 ORDER BY member")?;
        let members = stmt
            .query_map(rusqlite::params![key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .with_context(|| format!("Failed to list set {}", key))?;
        Ok(members)
    }

    pub async fn srandmember(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT member FROM kv_sets WHERE key = ?1 ORDER BY RANDOM() LIMIT 1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to pick from set {}", key))
    }

    pub async fn scard(&self, key: &str) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM kv_sets WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to count set {}", key))?;
        Ok(count as usize)
    }

    /// Prepend a value to a list.
    pub async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv_lists (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )
        .with_context(|| format!("Failed to push to list {}", key))?;
        Ok(())
    }

    /// Whole list, head first.
    pub async fn lrange(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT value FROM kv_lists WHERE key = ?1 ORDER BY seq DESC")?;
        let values = stmt
            .query_map(rusqlite::params![key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .with_context(|| format!("Failed to read list {}", key))?;
        Ok(values)
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT value FROM kv_hashes WHERE key = ?1 AND field = ?2",
            rusqlite::params![key, field],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read hash {} field {}", key, field))
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv_hashes (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, field, value],
        )
        .with_context(|| format!("Failed to write hash {} field {}", key, field))?;
        Ok(())
    }

    /// Increment an integer hash field, creating it at zero. Returns the new value.
    pub async fn hincrby(&self, key: &str, field: &str, by: i64) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv_hashes (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET
                value = CAST(CAST(kv_hashes.value AS INTEGER) + ?3 AS TEXT)",
            rusqlite::params![key, field, by],
        )
        .with_context(|| format!("Failed to increment hash {} field {}", key, field))?;

        let value: String = conn.query_row(
            "SELECT value FROM kv_hashes WHERE key = ?1 AND field = ?2",
            rusqlite::params![key, field],
            |row| row.get(0),
        )?;
        value
            .parse()
            .with_context(|| format!("Hash {} field {} is not an integer", key, field))
    }

    /// Every field of a hash, ordered by field.
    pub async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT field, value FROM kv_hashes WHERE key = ?1 ORDER BY field")?;
        let pairs = stmt
            .query_map(rusqlite::params![key], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, String)>>>()
            .with_context(|| format!("Failed to read hash {}", key))?;
        Ok(pairs)
    }
}
