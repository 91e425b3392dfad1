use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::models::PriceRecord;
use crate::Result;

/// Append-only price history in SQLite. Each round's write is one
/// self-contained transaction; rows are never updated or deleted.
#[derive(Clone)]
pub struct PriceStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PriceStatistics {
    pub count: i64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub avg_price: Option<f64>,
}

impl PriceStore {
    /// Open (creating if needed) the database file and its schema.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform TEXT NOT NULL,
                item_name TEXT NOT NULL,
                price REAL NOT NULL,
                wear REAL NOT NULL,
                url TEXT,
                timestamp INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_platform_item ON price_history(platform, item_name)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_timestamp ON price_history(timestamp)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one round's records in a single transaction. An empty batch is
    /// a no-op.
    pub async fn append_batch(&self, records: &[PriceRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO price_history (platform, item_name, price, wear, url, timestamp) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.platform)
            .bind(&record.item_name)
            .bind(record.price)
            .bind(record.wear)
            .bind(&record.url)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(records = records.len(), "appended price batch");
        Ok(())
    }

    pub async fn latest_prices(
        &self,
        platform: &str,
        item_name: &str,
        limit: u32,
    ) -> Result<Vec<PriceRecord>> {
        let records = sqlx::query_as::<_, PriceRecord>(
            "SELECT platform, item_name, price, wear, url, timestamp \
             FROM price_history \
             WHERE platform = ? AND item_name = ? \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ?",
        )
        .bind(platform)
        .bind(item_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Price statistics over the trailing `days`.
    pub async fn price_statistics(
        &self,
        platform: &str,
        item_name: &str,
        days: u32,
    ) -> Result<PriceStatistics> {
        let since = crate::models::epoch_now() - i64::from(days) * 24 * 3600;
        let stats = sqlx::query_as::<_, PriceStatistics>(
            "SELECT COUNT(*) as count, MIN(price) as min_price, \
                    MAX(price) as max_price, AVG(price) as avg_price \
             FROM price_history \
             WHERE platform = ? AND item_name = ? AND timestamp >= ?",
        )
        .bind(platform)
        .bind(item_name)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(platform: &str, price: f64, wear: f64) -> PriceRecord {
        PriceRecord::new(
            platform,
            "AK-47 | Redline (Field-Tested)",
            price,
            wear,
            Some("https://example.invalid/goods/1".to_string()),
        )
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = PriceStore::in_memory().await.unwrap();
        let original = record("buff", 118.5, 0.2134);
        store.append_batch(std::slice::from_ref(&original)).await.unwrap();

        let read = store
            .latest_prices("buff", "AK-47 | Redline (Field-Tested)", 10)
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0], original);
    }

    #[tokio::test]
    async fn test_reruns_append_rather_than_overwrite() {
        let store = PriceStore::in_memory().await.unwrap();
        let batch = vec![record("buff", 118.5, 0.2134), record("buff", 120.0, 0.25)];
        store.append_batch(&batch).await.unwrap();
        store.append_batch(&batch).await.unwrap();

        let stats = store
            .price_statistics("buff", "AK-47 | Redline (Field-Tested)", 7)
            .await
            .unwrap();
        assert_eq!(stats.count, 4);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_noop() {
        let store = PriceStore::in_memory().await.unwrap();
        store.append_batch(&[]).await.unwrap();
        let stats = store.price_statistics("buff", "X", 7).await.unwrap();
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = PriceStore::in_memory().await.unwrap();
        store
            .append_batch(&[
                record("youpin", 100.0, 0.2),
                record("youpin", 150.0, 0.3),
                record("buff", 999.0, 0.2),
            ])
            .await
            .unwrap();

        let stats = store
            .price_statistics("youpin", "AK-47 | Redline (Field-Tested)", 7)
            .await
            .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min_price, Some(100.0));
        assert_eq!(stats.max_price, Some(150.0));
        assert_eq!(stats.avg_price, Some(125.0));
    }

    #[tokio::test]
    async fn test_connect_creates_file_and_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prices.db");
        let store = PriceStore::connect(path.to_str().unwrap()).await.unwrap();
        store.append_batch(&[record("buff", 1.0, 0.2)]).await.unwrap();
        assert!(path.exists());
    }
}
