//! Seen-item set and high-water marks.
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::ports::store::{SeenItem, StoreError};

pub(super) async fn is_seen(
    pool: &SqlitePool,
    feed: &str,
    item_id: &str,
) -> Result<bool, StoreError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM feed_seen WHERE feed = ?1 AND item_id = ?2 LIMIT 1")
            .bind(feed)
            .bind(item_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub(super) async fn mark_seen<'e, E>(
    ex: E,
    feed: &str,
    item_id: &str,
    now_ms: i64,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO feed_seen(feed, item_id, first_seen_ms)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(feed, item_id) DO NOTHING
        "#,
    )
    .bind(feed)
    .bind(item_id)
    .bind(now_ms)
    .execute(ex)
    .await?;
    Ok(())
}

pub(super) async fn seen_count(pool: &SqlitePool, feed: &str) -> Result<i64, StoreError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_seen WHERE feed = ?1")
        .bind(feed)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

pub(super) async fn get_hwm(pool: &SqlitePool, feed: &str) -> Result<Option<i64>, StoreError> {
    let hwm: Option<i64> = sqlx::query_scalar("SELECT hwm_ms FROM feed_hwm WHERE feed = ?1")
        .bind(feed)
        .fetch_optional(pool)
        .await?;
    Ok(hwm)
}

pub(super) async fn update_hwm<'e, E>(ex: E, feed: &str, ts_ms: i64) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO feed_hwm(feed, hwm_ms)
        VALUES (?1, ?2)
        ON CONFLICT(feed) DO UPDATE SET hwm_ms = excluded.hwm_ms
        WHERE excluded.hwm_ms > feed_hwm.hwm_ms
        "#,
    )
    .bind(feed)
    .bind(ts_ms)
    .execute(ex)
    .await?;
    Ok(())
}

pub(super) async fn gc_seen(
    pool: &SqlitePool,
    feed: &str,
    horizon_ms: i64,
) -> Result<u64, StoreError> {
    let res = sqlx::query("DELETE FROM feed_seen WHERE feed = ?1 AND first_seen_ms < ?2")
        .bind(feed)
        .bind(horizon_ms)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub(super) async fn list_feeds(pool: &SqlitePool) -> Result<Vec<String>, StoreError> {
    let feeds = sqlx::query_scalar("SELECT DISTINCT feed FROM feed_seen ORDER BY feed")
        .fetch_all(pool)
        .await?;
    Ok(feeds)
}

pub(super) async fn list_items(pool: &SqlitePool, feed: &str) -> Result<Vec<SeenItem>, StoreError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT item_id, first_seen_ms FROM feed_seen
        WHERE feed = ?1
        ORDER BY first_seen_ms, item_id
        "#,
    )
    .bind(feed)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(item_id, first_seen_ms)| SeenItem {
            item_id,
            first_seen_ms,
        })
        .collect())
}
