//! Per-webhook outbound FIFO queues.
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::ports::store::{OutboxEntry, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    enqueued_ms: i64,
    payload: String,
    attempts: i64,
    next_attempt_ms: i64,
    origin_feed: String,
}

impl From<OutboxRow> for OutboxEntry {
    fn from(r: OutboxRow) -> Self {
        Self {
            seq: r.seq,
            enqueued_ms: r.enqueued_ms,
            payload: r.payload,
            attempts: r.attempts.max(0) as u32,
            next_attempt_ms: r.next_attempt_ms,
            origin_feed: r.origin_feed,
        }
    }
}

/// Allocates the next sequence number for a webhook; strictly increasing for
/// the lifetime of the database.
pub(super) async fn next_seq<'e, E>(ex: E, webhook: &str) -> Result<i64, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO wh_seq(webhook, seq)
        VALUES (?1, 1)
        ON CONFLICT(webhook) DO UPDATE SET seq = wh_seq.seq + 1
        RETURNING seq
        "#,
    )
    .bind(webhook)
    .fetch_one(ex)
    .await?;
    Ok(seq)
}

pub(super) async fn insert_entry<'e, E>(
    ex: E,
    webhook: &str,
    seq: i64,
    payload: &str,
    origin_feed: &str,
    now_ms: i64,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO wh_queue(webhook, seq, enqueued_ms, payload, attempts, next_attempt_ms, origin_feed)
        VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)
        "#,
    )
    .bind(webhook)
    .bind(seq)
    .bind(now_ms)
    .bind(payload)
    .bind(now_ms)
    .bind(origin_feed)
    .execute(ex)
    .await?;
    Ok(())
}

pub(super) async fn peek_oldest(
    pool: &SqlitePool,
    webhook: &str,
) -> Result<Option<OutboxEntry>, StoreError> {
    let row: Option<OutboxRow> = sqlx::query_as(
        r#"
        SELECT seq, enqueued_ms, payload, attempts, next_attempt_ms, origin_feed
        FROM wh_queue
        WHERE webhook = ?1
        ORDER BY seq ASC
        LIMIT 1
        "#,
    )
    .bind(webhook)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(OutboxEntry::from))
}

pub(super) async fn remove_entry(
    pool: &SqlitePool,
    webhook: &str,
    seq: i64,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM wh_queue WHERE webhook = ?1 AND seq = ?2")
        .bind(webhook)
        .bind(seq)
        .execute(pool)
        .await?;
    Ok(())
}

pub(super) async fn resched_entry(
    pool: &SqlitePool,
    webhook: &str,
    seq: i64,
    attempts: u32,
    next_attempt_ms: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE wh_queue SET attempts = ?3, next_attempt_ms = ?4
        WHERE webhook = ?1 AND seq = ?2
        "#,
    )
    .bind(webhook)
    .bind(seq)
    .bind(attempts as i64)
    .bind(next_attempt_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn queue_depth(pool: &SqlitePool, webhook: &str) -> Result<i64, StoreError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wh_queue WHERE webhook = ?1")
        .bind(webhook)
        .fetch_one(pool)
        .await?;
    Ok(n)
}
