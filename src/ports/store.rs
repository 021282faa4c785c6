//! Durable state the pipeline depends on: seen-items, high-water marks,
//! per-webhook outbound queues, and counters.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// One queued delivery for a webhook. `seq` assigns FIFO order and never
/// changes once the entry is enqueued.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub seq: i64,
    pub enqueued_ms: i64,
    pub payload: String,
    pub attempts: u32,
    pub next_attempt_ms: i64,
    pub origin_feed: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub received_count: i64,
    pub error_count: i64,
    pub last_received_ms: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookStats {
    pub sent_count: i64,
    pub error_count: i64,
    pub last_sent_ms: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SeenItem {
    pub item_id: String,
    pub first_seen_ms: i64,
}

/// One surviving item of a poll pass, with the payloads to enqueue for each
/// target webhook. An empty `enqueues` list marks the item seen without
/// queuing anything (first-run suppression).
#[derive(Debug, Clone)]
pub struct CommitItem {
    pub item_id: String,
    pub published_ms: i64,
    pub enqueues: Vec<QueuedPayload>,
}

#[derive(Debug, Clone)]
pub struct QueuedPayload {
    pub webhook: String,
    pub payload: String,
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn is_seen(&self, feed: &str, item_id: &str) -> Result<bool, StoreError>;
    /// Idempotent: marking the same (feed, item_id) twice leaves one record.
    async fn mark_seen(&self, feed: &str, item_id: &str, now_ms: i64) -> Result<(), StoreError>;
    async fn seen_count(&self, feed: &str) -> Result<i64, StoreError>;

    async fn get_hwm(&self, feed: &str) -> Result<Option<i64>, StoreError>;
    /// Writes only if `ts_ms` is newer than the stored mark.
    async fn update_hwm(&self, feed: &str, ts_ms: i64) -> Result<(), StoreError>;

    /// Marks a batch of items seen, advances the high-water mark, and enqueues
    /// all their payloads in one transaction, so a crash cannot leave an item
    /// seen but not queued. Items must be given in ascending `published_ms`
    /// order; enqueue order follows it.
    async fn commit_items(
        &self,
        feed: &str,
        items: &[CommitItem],
        now_ms: i64,
    ) -> Result<(), StoreError>;

    async fn enqueue(
        &self,
        webhook: &str,
        payload: &str,
        origin_feed: &str,
        now_ms: i64,
    ) -> Result<i64, StoreError>;
    async fn peek_oldest(&self, webhook: &str) -> Result<Option<OutboxEntry>, StoreError>;
    async fn remove_entry(&self, webhook: &str, seq: i64) -> Result<(), StoreError>;
    /// Updates attempts and next_attempt in place; `seq` (and thus queue
    /// position) is preserved.
    async fn resched_entry(
        &self,
        webhook: &str,
        seq: i64,
        attempts: u32,
        next_attempt_ms: i64,
    ) -> Result<(), StoreError>;
    async fn queue_depth(&self, webhook: &str) -> Result<i64, StoreError>;

    /// Removes seen entries first observed before `horizon_ms`. Returns the
    /// number of rows removed.
    async fn gc_seen(&self, feed: &str, horizon_ms: i64) -> Result<u64, StoreError>;

    async fn inc_feed_received(&self, feed: &str, now_ms: i64, n: i64) -> Result<(), StoreError>;
    async fn inc_feed_error(&self, feed: &str) -> Result<(), StoreError>;
    async fn inc_webhook_sent(&self, webhook: &str, now_ms: i64) -> Result<(), StoreError>;
    async fn inc_webhook_error(&self, webhook: &str) -> Result<(), StoreError>;

    async fn list_feeds(&self) -> Result<Vec<String>, StoreError>;
    async fn list_items(&self, feed: &str) -> Result<Vec<SeenItem>, StoreError>;
    async fn get_feed_stats(&self, feed: &str) -> Result<Option<FeedStats>, StoreError>;
    async fn get_webhook_stats(&self, webhook: &str) -> Result<Option<WebhookStats>, StoreError>;
}
