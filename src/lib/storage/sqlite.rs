use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use anyhow::Result;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::core::JournalEntry;
use crate::storage::Storage;

pub struct SQLiteStorage {
    pool: SqlitePool,
}

impl SQLiteStorage {
    pub async fn new(path: &str, max_concurrent_ops: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_concurrent_ops)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// Private in-memory database; lives as long as its single pooled connection.
    pub async fn new_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS journal (
                  block_number INTEGER PRIMARY KEY,
                  tx_hash TEXT NOT NULL UNIQUE,
                  sender TEXT NOT NULL,
                  timestamp INTEGER NOT NULL,
                  action TEXT NOT NULL)
                ",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for SQLiteStorage {
    async fn append(&self, entry: &JournalEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO journal (block_number, tx_hash, sender, timestamp, action)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(i64::try_from(entry.block_number)?)
        .bind(entry.tx_hash.as_str())
        .bind(entry.from.as_str())
        .bind(entry.timestamp)
        .bind(serde_json::to_string(&entry.action)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn entries_after(&self, block_number: u64) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            "SELECT block_number, tx_hash, sender, timestamp, action
             FROM journal
             WHERE block_number > ?
             ORDER BY block_number",
        )
        .bind(i64::try_from(block_number)?)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(JournalEntry {
                block_number: u64::try_from(row.try_get::<i64, _>("block_number")?)?,
                tx_hash: row.try_get::<String, _>("tx_hash")?.parse()?,
                from: row.try_get::<String, _>("sender")?.parse()?,
                timestamp: row.try_get("timestamp")?,
                action: serde_json::from_str(&row.try_get::<String, _>("action")?)?,
            });
        }
        Ok(entries)
    }
}
