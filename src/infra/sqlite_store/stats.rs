//! Per-feed and per-webhook delivery counters.
use sqlx::SqlitePool;

use crate::ports::store::{FeedStats, StoreError, WebhookStats};

pub(super) async fn inc_feed_received(
    pool: &SqlitePool,
    feed: &str,
    now_ms: i64,
    n: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO feed_stats(feed, received_count, error_count, last_received_ms)
        VALUES (?1, ?2, 0, ?3)
        ON CONFLICT(feed) DO UPDATE SET
            received_count = feed_stats.received_count + ?2,
            last_received_ms = excluded.last_received_ms
        "#,
    )
    .bind(feed)
    .bind(n)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn inc_feed_error(pool: &SqlitePool, feed: &str) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO feed_stats(feed, received_count, error_count, last_received_ms)
        VALUES (?1, 0, 1, NULL)
        ON CONFLICT(feed) DO UPDATE SET error_count = feed_stats.error_count + 1
        "#,
    )
    .bind(feed)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn inc_webhook_sent(
    pool: &SqlitePool,
    webhook: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO wh_stats(webhook, sent_count, error_count, last_sent_ms)
        VALUES (?1, 1, 0, ?2)
        ON CONFLICT(webhook) DO UPDATE SET
            sent_count = wh_stats.sent_count + 1,
            last_sent_ms = excluded.last_sent_ms
        "#,
    )
    .bind(webhook)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn inc_webhook_error(pool: &SqlitePool, webhook: &str) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO wh_stats(webhook, sent_count, error_count, last_sent_ms)
        VALUES (?1, 0, 1, NULL)
        ON CONFLICT(webhook) DO UPDATE SET error_count = wh_stats.error_count + 1
        "#,
    )
    .bind(webhook)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn get_feed_stats(
    pool: &SqlitePool,
    feed: &str,
) -> Result<Option<FeedStats>, StoreError> {
    let row: Option<(i64, i64, Option<i64>)> = sqlx::query_as(
        "SELECT received_count, error_count, last_received_ms FROM feed_stats WHERE feed = ?1",
    )
    .bind(feed)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(received_count, error_count, last_received_ms)| FeedStats {
        received_count,
        error_count,
        last_received_ms,
    }))
}

pub(super) async fn get_webhook_stats(
    pool: &SqlitePool,
    webhook: &str,
) -> Result<Option<WebhookStats>, StoreError> {
    let row: Option<(i64, i64, Option<i64>)> = sqlx::query_as(
        "SELECT sent_count, error_count, last_sent_ms FROM wh_stats WHERE webhook = ?1",
    )
    .bind(webhook)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(sent_count, error_count, last_sent_ms)| WebhookStats {
        sent_count,
        error_count,
        last_sent_ms,
    }))
}
