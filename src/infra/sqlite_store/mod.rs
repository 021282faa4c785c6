//! SQLite-backed `Store`: a single database file holding seen-items,
//! high-water marks, outbound queues, and counters.
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::ports::store::{
    CommitItem, FeedStats, OutboxEntry, SeenItem, Store, StoreError, WebhookStats,
};

mod queue;
mod seen;
mod stats;

pub const DB_FILENAME: &str = "feedforward.db";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(e.to_string())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Db(format!("db dir create error: {e}")))?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// One shared in-memory connection, for tests. The connection must never
    /// be recycled or the database vanishes with it.
    pub async fn open_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Creates missing tables; existing data is left untouched.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let ddls = [
            r#"
            CREATE TABLE IF NOT EXISTS feed_seen(
                feed TEXT NOT NULL,
                item_id TEXT NOT NULL,
                first_seen_ms INTEGER NOT NULL,
                PRIMARY KEY(feed, item_id)
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS feed_hwm(
                feed TEXT PRIMARY KEY,
                hwm_ms INTEGER NOT NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS feed_stats(
                feed TEXT PRIMARY KEY,
                received_count INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                last_received_ms INTEGER NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS wh_stats(
                webhook TEXT PRIMARY KEY,
                sent_count INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                last_sent_ms INTEGER NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS wh_queue(
                webhook TEXT NOT NULL,
                seq INTEGER NOT NULL,
                enqueued_ms INTEGER NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                next_attempt_ms INTEGER NOT NULL,
                origin_feed TEXT NOT NULL,
                PRIMARY KEY(webhook, seq)
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS wh_seq(
                webhook TEXT PRIMARY KEY,
                seq INTEGER NOT NULL
            )"#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_feed_seen_first_seen
            ON feed_seen(feed, first_seen_ms)"#,
        ];
        for ddl in ddls {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        info!("database ready");
        Ok(())
    }

    /// Flushes and releases the database file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn is_seen(&self, feed: &str, item_id: &str) -> Result<bool, StoreError> {
        seen::is_seen(&self.pool, feed, item_id).await
    }

    async fn mark_seen(&self, feed: &str, item_id: &str, now_ms: i64) -> Result<(), StoreError> {
        seen::mark_seen(&self.pool, feed, item_id, now_ms).await
    }

    async fn seen_count(&self, feed: &str) -> Result<i64, StoreError> {
        seen::seen_count(&self.pool, feed).await
    }

    async fn get_hwm(&self, feed: &str) -> Result<Option<i64>, StoreError> {
        seen::get_hwm(&self.pool, feed).await
    }

    async fn update_hwm(&self, feed: &str, ts_ms: i64) -> Result<(), StoreError> {
        seen::update_hwm(&self.pool, feed, ts_ms).await
    }

    async fn commit_items(
        &self,
        feed: &str,
        items: &[CommitItem],
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            seen::mark_seen(&mut *tx, feed, &item.item_id, now_ms).await?;
            seen::update_hwm(&mut *tx, feed, item.published_ms).await?;
            for q in &item.enqueues {
                let seq = queue::next_seq(&mut *tx, &q.webhook).await?;
                queue::insert_entry(&mut *tx, &q.webhook, seq, &q.payload, feed, now_ms).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn enqueue(
        &self,
        webhook: &str,
        payload: &str,
        origin_feed: &str,
        now_ms: i64,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let seq = queue::next_seq(&mut *tx, webhook).await?;
        queue::insert_entry(&mut *tx, webhook, seq, payload, origin_feed, now_ms).await?;
        tx.commit().await?;
        Ok(seq)
    }

    async fn peek_oldest(&self, webhook: &str) -> Result<Option<OutboxEntry>, StoreError> {
        queue::peek_oldest(&self.pool, webhook).await
    }

    async fn remove_entry(&self, webhook: &str, seq: i64) -> Result<(), StoreError> {
        queue::remove_entry(&self.pool, webhook, seq).await
    }

    async fn resched_entry(
        &self,
        webhook: &str,
        seq: i64,
        attempts: u32,
        next_attempt_ms: i64,
    ) -> Result<(), StoreError> {
        queue::resched_entry(&self.pool, webhook, seq, attempts, next_attempt_ms).await
    }

    async fn queue_depth(&self, webhook: &str) -> Result<i64, StoreError> {
        queue::queue_depth(&self.pool, webhook).await
    }

    async fn gc_seen(&self, feed: &str, horizon_ms: i64) -> Result<u64, StoreError> {
        seen::gc_seen(&self.pool, feed, horizon_ms).await
    }

    async fn inc_feed_received(&self, feed: &str, now_ms: i64, n: i64) -> Result<(), StoreError> {
        stats::inc_feed_received(&self.pool, feed, now_ms, n).await
    }

    async fn inc_feed_error(&self, feed: &str) -> Result<(), StoreError> {
        stats::inc_feed_error(&self.pool, feed).await
    }

    async fn inc_webhook_sent(&self, webhook: &str, now_ms: i64) -> Result<(), StoreError> {
        stats::inc_webhook_sent(&self.pool, webhook, now_ms).await
    }

    async fn inc_webhook_error(&self, webhook: &str) -> Result<(), StoreError> {
        stats::inc_webhook_error(&self.pool, webhook).await
    }

    async fn list_feeds(&self) -> Result<Vec<String>, StoreError> {
        seen::list_feeds(&self.pool).await
    }

    async fn list_items(&self, feed: &str) -> Result<Vec<SeenItem>, StoreError> {
        seen::list_items(&self.pool, feed).await
    }

    async fn get_feed_stats(&self, feed: &str) -> Result<Option<FeedStats>, StoreError> {
        stats::get_feed_stats(&self.pool, feed).await
    }

    async fn get_webhook_stats(&self, webhook: &str) -> Result<Option<WebhookStats>, StoreError> {
        stats::get_webhook_stats(&self.pool, webhook).await
    }
}
