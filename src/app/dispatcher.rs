//! One dispatcher task per webhook: serial FIFO delivery with rate limiting,
//! retries, and backoff.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::app::rate_limit::{Gate, SlidingWindow};
use crate::domain::backoff::retry_backoff_ms;
use crate::domain::model::WebhookConfig;
use crate::ports::clock::Clock;
use crate::ports::http::{HookPost, RetryAfter};
use crate::ports::random::RandomSource;
use crate::ports::store::{Store, StoreError};

const MAX_ATTEMPTS: u32 = 10;
const RETRY_BASE_SECS: u64 = 10;
const RETRY_MAX_SECS: u64 = 1800;
const RETRY_JITTER_FRACTION: f64 = 0.25;
const IDLE_POLL_MS: u64 = 5000;
const DEFAULT_RETRY_AFTER_MS: i64 = 30_000;

/// What one `step` call did; `run` uses it to decide how long to sleep, and
/// tests use it to drive the dispatcher deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Queue is empty.
    Idle,
    Delivered { seq: i64 },
    /// Permanently rejected (4xx) and dropped.
    Dropped { seq: i64, status: u16 },
    /// Gave up after the retry budget was exhausted.
    Abandoned { seq: i64 },
    /// Pushed into the future, either by a 429 or by backoff.
    Rescheduled { seq: i64, until_ms: i64 },
    /// Head of the queue is not due yet.
    NotDue { until_ms: i64 },
    RateLimited { reset_ms: i64 },
}

pub struct Dispatcher<S, P, C, G> {
    webhook: WebhookConfig,
    store: Arc<S>,
    post: Arc<P>,
    clock: Arc<C>,
    rng: Arc<G>,
    limiter: SlidingWindow,
    wake: Arc<Notify>,
}

impl<S, P, C, G> Dispatcher<S, P, C, G>
where
    S: Store,
    P: HookPost,
    C: Clock,
    G: RandomSource,
{
    pub fn new(
        webhook: WebhookConfig,
        store: Arc<S>,
        post: Arc<P>,
        clock: Arc<C>,
        rng: Arc<G>,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            webhook,
            store,
            post,
            clock,
            rng,
            limiter: SlidingWindow::default(),
            wake,
        }
    }

    /// Consumes the queue until told to stop, then drains what is left.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        let mut draining = false;
        loop {
            match self.step().await {
                Err(e) => {
                    warn!(webhook = %self.webhook.name, error = %e, "dispatch step failed");
                    if draining {
                        break;
                    }
                    self.wait(IDLE_POLL_MS, &mut draining, &mut shutdown).await;
                }
                Ok(StepOutcome::Idle) => {
                    if draining {
                        break;
                    }
                    self.wait(IDLE_POLL_MS, &mut draining, &mut shutdown).await;
                }
                Ok(StepOutcome::NotDue { until_ms }) => {
                    if draining {
                        break;
                    }
                    let now_ms = self.clock.now_epoch_ms().await;
                    let ms = (until_ms - now_ms).max(0) as u64;
                    self.wait(ms, &mut draining, &mut shutdown).await;
                }
                Ok(StepOutcome::RateLimited { reset_ms }) => {
                    self.wait(reset_ms.max(0) as u64, &mut draining, &mut shutdown)
                        .await;
                }
                // Something happened to the queue head; look again right away.
                Ok(_) => {}
            }
        }
        info!(webhook = %self.webhook.name, "dispatcher stopped");
    }

    /// Looks at the head of the queue and performs at most one delivery
    /// attempt. Never sleeps.
    pub async fn step(&mut self) -> Result<StepOutcome, StoreError> {
        let entry = match self.store.peek_oldest(&self.webhook.name).await? {
            Some(e) => e,
            None => return Ok(StepOutcome::Idle),
        };
        let now_ms = self.clock.now_epoch_ms().await;
        if entry.next_attempt_ms > now_ms {
            return Ok(StepOutcome::NotDue {
                until_ms: entry.next_attempt_ms,
            });
        }
        if let Gate::Denied { reset_ms } = self.limiter.check(now_ms) {
            return Ok(StepOutcome::RateLimited { reset_ms });
        }

        let result = self.post.post(&self.webhook.url, &entry.payload).await;
        let now_ms = self.clock.now_epoch_ms().await;

        match result.status {
            Some(status) if (200..300).contains(&status) => {
                self.store.remove_entry(&self.webhook.name, entry.seq).await?;
                self.store
                    .inc_webhook_sent(&self.webhook.name, now_ms)
                    .await?;
                self.limiter.record(now_ms);
                info!(webhook = %self.webhook.name, seq = entry.seq, status, "message posted");
                Ok(StepOutcome::Delivered { seq: entry.seq })
            }
            Some(429) => {
                // Server-side throttling is not a client failure: attempts
                // stay untouched.
                let until_ms = match result.retry_after {
                    Some(RetryAfter::Delay(ms)) => now_ms + ms,
                    Some(RetryAfter::Until(at_ms)) => at_ms.max(now_ms),
                    None => now_ms + DEFAULT_RETRY_AFTER_MS,
                };
                self.store
                    .resched_entry(&self.webhook.name, entry.seq, entry.attempts, until_ms)
                    .await?;
                warn!(webhook = %self.webhook.name, seq = entry.seq, until_ms, "throttled by endpoint");
                Ok(StepOutcome::Rescheduled {
                    seq: entry.seq,
                    until_ms,
                })
            }
            Some(status) if (400..500).contains(&status) => {
                self.store.remove_entry(&self.webhook.name, entry.seq).await?;
                self.store.inc_webhook_error(&self.webhook.name).await?;
                warn!(
                    webhook = %self.webhook.name,
                    seq = entry.seq,
                    status,
                    feed = %entry.origin_feed,
                    "delivery rejected, dropping"
                );
                Ok(StepOutcome::Dropped {
                    seq: entry.seq,
                    status,
                })
            }
            _ => {
                // 5xx or transport failure.
                let attempts = entry.attempts + 1;
                self.store.inc_webhook_error(&self.webhook.name).await?;
                if attempts >= MAX_ATTEMPTS {
                    self.store.remove_entry(&self.webhook.name, entry.seq).await?;
                    warn!(
                        webhook = %self.webhook.name,
                        seq = entry.seq,
                        attempts,
                        "abandoning delivery"
                    );
                    return Ok(StepOutcome::Abandoned { seq: entry.seq });
                }
                let rand01 = self.rng.next_f64().await;
                let backoff_ms = retry_backoff_ms(
                    RETRY_BASE_SECS,
                    attempts,
                    RETRY_MAX_SECS,
                    RETRY_JITTER_FRACTION,
                    rand01,
                );
                let until_ms = now_ms + backoff_ms;
                self.store
                    .resched_entry(&self.webhook.name, entry.seq, attempts, until_ms)
                    .await?;
                warn!(
                    webhook = %self.webhook.name,
                    seq = entry.seq,
                    attempts,
                    status = ?result.status,
                    error = result.error.as_deref().unwrap_or(""),
                    "delivery failed, retrying"
                );
                Ok(StepOutcome::Rescheduled {
                    seq: entry.seq,
                    until_ms,
                })
            }
        }
    }

    async fn wait(&self, ms: u64, draining: &mut bool, shutdown: &mut mpsc::Receiver<()>) {
        if *draining {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return;
        }
        tokio::select! {
            _ = self.wake.notified() => {}
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
            _ = shutdown.recv() => {
                *draining = true;
            }
        }
    }
}
