//! One poller task per enabled feed: fetch, filter, persist, enqueue, wake.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::domain::backoff::jittered_ms;
use crate::domain::model::{AppConfig, FeedConfig, NormalizedItem};
use crate::hook::render::render;
use crate::ports::clock::Clock;
use crate::ports::http::FeedFetch;
use crate::ports::random::RandomSource;
use crate::ports::store::{CommitItem, QueuedPayload, Store, StoreError};

const TICKER_JITTER_FRACTION: f64 = 0.1;
const GC_EVERY_TICKS: u64 = 10;
const DAY_MS: i64 = 86_400_000;

pub struct Poller<S, F, C, G> {
    feed: FeedConfig,
    oldest_ms: i64,
    ticker_ms: u64,
    store: Arc<S>,
    fetch: Arc<F>,
    clock: Arc<C>,
    rng: Arc<G>,
    /// Wake handles for this feed's target dispatchers.
    wakers: HashMap<String, Arc<Notify>>,
    ticks: u64,
}

impl<S, F, C, G> Poller<S, F, C, G>
where
    S: Store,
    F: FeedFetch,
    C: Clock,
    G: RandomSource,
{
    pub fn new(
        feed: FeedConfig,
        app: &AppConfig,
        store: Arc<S>,
        fetch: Arc<F>,
        clock: Arc<C>,
        rng: Arc<G>,
        wakers: HashMap<String, Arc<Notify>>,
    ) -> Self {
        Self {
            feed,
            oldest_ms: app.oldest_secs as i64 * 1000,
            ticker_ms: app.ticker_secs * 1000,
            store,
            fetch,
            clock,
            rng,
            wakers,
            ticks: 0,
        }
    }

    /// Ticks until told to stop; an in-flight tick always finishes. Ticks
    /// never overlap since this loop is the only caller.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        loop {
            if let Err(e) = self.tick().await {
                warn!(feed = %self.feed.name, error = %e, "poll tick failed");
            }
            let rand01 = self.rng.next_f64().await;
            let sleep_ms = jittered_ms(self.ticker_ms, TICKER_JITTER_FRACTION, rand01);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(sleep_ms as u64)) => {}
                _ = shutdown.recv() => {
                    info!(feed = %self.feed.name, "poller stopped");
                    return;
                }
            }
        }
    }

    /// One poll pass over the feed.
    pub async fn tick(&mut self) -> Result<(), StoreError> {
        self.ticks += 1;
        let now_ms = self.clock.now_epoch_ms().await;
        let hwm = self.store.get_hwm(&self.feed.name).await?;

        if self.ticks % GC_EVERY_TICKS == 0 {
            self.collect_garbage(now_ms, hwm).await?;
        }

        let fetched = match self.fetch.fetch(&self.feed.url, now_ms).await {
            Ok(f) => f,
            Err(e) => {
                warn!(feed = %self.feed.name, error = %e, "feed fetch failed");
                self.store.inc_feed_error(&self.feed.name).await?;
                return Ok(());
            }
        };

        let horizon = now_ms - self.oldest_ms;
        let mut fresh: Vec<NormalizedItem> = Vec::new();
        for item in fetched.items {
            if item.published_ms < horizon {
                continue;
            }
            if self.store.is_seen(&self.feed.name, &item.id).await? {
                continue;
            }
            fresh.push(item);
        }
        if fresh.is_empty() {
            debug!(feed = %self.feed.name, "no new items");
            return Ok(());
        }
        fresh.sort_by(|a, b| a.published_ms.cmp(&b.published_ms).then(a.id.cmp(&b.id)));

        // A feed polled for the very first time only records history; pushing
        // every archived item at a fresh configuration would flood the hooks.
        let first_run = hwm.is_none() && self.store.seen_count(&self.feed.name).await? == 0;

        let feed_title = fetched
            .meta
            .title
            .as_deref()
            .unwrap_or(&self.feed.name)
            .to_string();

        let mut commits: Vec<CommitItem> = Vec::with_capacity(fresh.len());
        for item in &fresh {
            let enqueues = if first_run {
                Vec::new()
            } else {
                let payload = match serde_json::to_string(&render(item, &feed_title, &self.feed)) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(feed = %self.feed.name, item = %item.id, error = %e, "render failed, skipping item");
                        continue;
                    }
                };
                self.feed
                    .webhooks
                    .iter()
                    .map(|w| QueuedPayload {
                        webhook: w.clone(),
                        payload: payload.clone(),
                    })
                    .collect()
            };
            commits.push(CommitItem {
                item_id: item.id.clone(),
                published_ms: item.published_ms,
                enqueues,
            });
        }

        self.store
            .commit_items(&self.feed.name, &commits, now_ms)
            .await?;
        self.store
            .inc_feed_received(&self.feed.name, now_ms, commits.len() as i64)
            .await?;

        if first_run {
            info!(
                feed = %self.feed.name,
                suppressed = commits.len(),
                "first poll, recorded existing items without delivering"
            );
            return Ok(());
        }

        info!(feed = %self.feed.name, items = commits.len(), "enqueued new items");
        for webhook in &self.feed.webhooks {
            if let Some(waker) = self.wakers.get(webhook) {
                waker.notify_one();
            }
        }
        Ok(())
    }

    /// Seen entries are only dropped once they are past the freshness horizon
    /// and a day behind the high-water mark, so a feed that republishes old
    /// ids cannot slip a duplicate through.
    async fn collect_garbage(&self, now_ms: i64, hwm: Option<i64>) -> Result<(), StoreError> {
        let mut horizon = now_ms - self.oldest_ms.max(DAY_MS);
        if let Some(hwm) = hwm {
            horizon = horizon.min(hwm - DAY_MS);
        }
        let removed = self.store.gc_seen(&self.feed.name, horizon).await?;
        if removed > 0 {
            debug!(feed = %self.feed.name, removed, "seen-set garbage collected");
        }
        Ok(())
    }
}
