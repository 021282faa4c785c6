//! Durable-state semantics over an in-memory database.
use feedforward::infra::sqlite_store::SqliteStore;
use feedforward::ports::store::{CommitItem, QueuedPayload, Store};

async fn store() -> SqliteStore {
    let s = SqliteStore::open_memory().await.unwrap();
    s.migrate().await.unwrap();
    s
}

#[tokio::test]
async fn mark_seen_is_idempotent() {
    let s = store().await;
    s.mark_seen("feed1", "item-1", 100).await.unwrap();
    s.mark_seen("feed1", "item-1", 200).await.unwrap();
    assert!(s.is_seen("feed1", "item-1").await.unwrap());
    assert_eq!(s.seen_count("feed1").await.unwrap(), 1);
    // First observation wins.
    let items = s.list_items("feed1").await.unwrap();
    assert_eq!(items[0].first_seen_ms, 100);
}

#[tokio::test]
async fn seen_is_scoped_per_feed() {
    let s = store().await;
    s.mark_seen("feed1", "item-1", 100).await.unwrap();
    assert!(!s.is_seen("feed2", "item-1").await.unwrap());
}

#[tokio::test]
async fn hwm_only_moves_forward() {
    let s = store().await;
    assert_eq!(s.get_hwm("feed1").await.unwrap(), None);
    s.update_hwm("feed1", 100).await.unwrap();
    s.update_hwm("feed1", 50).await.unwrap();
    assert_eq!(s.get_hwm("feed1").await.unwrap(), Some(100));
    s.update_hwm("feed1", 200).await.unwrap();
    assert_eq!(s.get_hwm("feed1").await.unwrap(), Some(200));
}

#[tokio::test]
async fn queue_is_fifo_and_seq_is_never_reused() {
    let s = store().await;
    let s1 = s.enqueue("hook1", "p1", "feed1", 10).await.unwrap();
    let s2 = s.enqueue("hook1", "p2", "feed1", 11).await.unwrap();
    assert!(s2 > s1);

    let head = s.peek_oldest("hook1").await.unwrap().unwrap();
    assert_eq!(head.seq, s1);
    assert_eq!(head.payload, "p1");
    assert_eq!(head.origin_feed, "feed1");
    assert_eq!(head.attempts, 0);

    s.remove_entry("hook1", s1).await.unwrap();
    let head = s.peek_oldest("hook1").await.unwrap().unwrap();
    assert_eq!(head.seq, s2);

    let s3 = s.enqueue("hook1", "p3", "feed1", 12).await.unwrap();
    assert!(s3 > s2);
    assert_eq!(s.queue_depth("hook1").await.unwrap(), 2);
}

#[tokio::test]
async fn queues_are_isolated_per_webhook() {
    let s = store().await;
    s.enqueue("hook1", "a", "feed1", 1).await.unwrap();
    s.enqueue("hook2", "b", "feed1", 1).await.unwrap();
    assert_eq!(s.queue_depth("hook1").await.unwrap(), 1);
    assert_eq!(s.queue_depth("hook2").await.unwrap(), 1);
    assert_eq!(
        s.peek_oldest("hook2").await.unwrap().unwrap().payload,
        "b"
    );
}

#[tokio::test]
async fn resched_keeps_queue_position() {
    let s = store().await;
    let s1 = s.enqueue("hook1", "p1", "feed1", 10).await.unwrap();
    s.enqueue("hook1", "p2", "feed1", 11).await.unwrap();

    s.resched_entry("hook1", s1, 3, 99_999).await.unwrap();
    let head = s.peek_oldest("hook1").await.unwrap().unwrap();
    assert_eq!(head.seq, s1);
    assert_eq!(head.attempts, 3);
    assert_eq!(head.next_attempt_ms, 99_999);
}

#[tokio::test]
async fn commit_items_enqueues_in_published_order() {
    let s = store().await;
    let items = vec![
        CommitItem {
            item_id: "older".into(),
            published_ms: 1_000,
            enqueues: vec![
                QueuedPayload {
                    webhook: "hook1".into(),
                    payload: "older-p".into(),
                },
                QueuedPayload {
                    webhook: "hook2".into(),
                    payload: "older-p".into(),
                },
            ],
        },
        CommitItem {
            item_id: "newer".into(),
            published_ms: 2_000,
            enqueues: vec![
                QueuedPayload {
                    webhook: "hook1".into(),
                    payload: "newer-p".into(),
                },
                QueuedPayload {
                    webhook: "hook2".into(),
                    payload: "newer-p".into(),
                },
            ],
        },
    ];
    s.commit_items("feed1", &items, 5_000).await.unwrap();

    assert!(s.is_seen("feed1", "older").await.unwrap());
    assert!(s.is_seen("feed1", "newer").await.unwrap());
    assert_eq!(s.get_hwm("feed1").await.unwrap(), Some(2_000));
    for hook in ["hook1", "hook2"] {
        assert_eq!(s.queue_depth(hook).await.unwrap(), 2);
        assert_eq!(s.peek_oldest(hook).await.unwrap().unwrap().payload, "older-p");
    }
}

#[tokio::test]
async fn commit_items_without_enqueues_only_marks_seen() {
    let s = store().await;
    let items = vec![CommitItem {
        item_id: "suppressed".into(),
        published_ms: 1_000,
        enqueues: Vec::new(),
    }];
    s.commit_items("feed1", &items, 5_000).await.unwrap();
    assert!(s.is_seen("feed1", "suppressed").await.unwrap());
    assert_eq!(s.get_hwm("feed1").await.unwrap(), Some(1_000));
    assert_eq!(s.queue_depth("hook1").await.unwrap(), 0);
}

#[tokio::test]
async fn gc_removes_only_entries_past_the_horizon() {
    let s = store().await;
    s.mark_seen("feed1", "old", 1_000).await.unwrap();
    s.mark_seen("feed1", "new", 9_000).await.unwrap();
    let removed = s.gc_seen("feed1", 5_000).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!s.is_seen("feed1", "old").await.unwrap());
    assert!(s.is_seen("feed1", "new").await.unwrap());
}

#[tokio::test]
async fn counters_accumulate() {
    let s = store().await;
    assert!(s.get_feed_stats("feed1").await.unwrap().is_none());

    s.inc_feed_received("feed1", 1_000, 2).await.unwrap();
    s.inc_feed_received("feed1", 2_000, 1).await.unwrap();
    s.inc_feed_error("feed1").await.unwrap();
    let fs = s.get_feed_stats("feed1").await.unwrap().unwrap();
    assert_eq!(fs.received_count, 3);
    assert_eq!(fs.error_count, 1);
    assert_eq!(fs.last_received_ms, Some(2_000));

    s.inc_webhook_sent("hook1", 3_000).await.unwrap();
    s.inc_webhook_error("hook1").await.unwrap();
    let ws = s.get_webhook_stats("hook1").await.unwrap().unwrap();
    assert_eq!(ws.sent_count, 1);
    assert_eq!(ws.error_count, 1);
    assert_eq!(ws.last_sent_ms, Some(3_000));
}

#[tokio::test]
async fn list_feeds_and_items() {
    let s = store().await;
    s.mark_seen("beta", "b1", 10).await.unwrap();
    s.mark_seen("alpha", "a1", 20).await.unwrap();
    s.mark_seen("alpha", "a2", 30).await.unwrap();
    assert_eq!(s.list_feeds().await.unwrap(), vec!["alpha", "beta"]);
    let items = s.list_items("alpha").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item_id, "a1");
    assert_eq!(items[1].item_id, "a2");
}
