//! Outbound HTTP capabilities: fetching a feed and posting to a webhook.
use thiserror::Error;

use crate::domain::model::{FeedMeta, NormalizedItem};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    Upstream(u16),
    #[error("malformed feed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub meta: FeedMeta,
    pub items: Vec<NormalizedItem>,
}

#[async_trait::async_trait]
pub trait FeedFetch: Send + Sync {
    /// Fetches and parses one feed URL. `now_ms` backs the published-date
    /// fallback for items that carry no timestamp at all.
    async fn fetch(&self, url: &str, now_ms: i64) -> Result<FetchedFeed, FetchError>;
}

/// When the endpoint throttles us it answers 429 with a Retry-After header,
/// either as a delay in seconds or as an absolute HTTP-date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    Delay(i64),
    Until(i64),
}

/// Outcome of one POST attempt. `status` is `None` on transport failure.
#[derive(Debug, Clone)]
pub struct PostResult {
    pub status: Option<u16>,
    pub retry_after: Option<RetryAfter>,
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait HookPost: Send + Sync {
    async fn post(&self, url: &str, body: &str) -> PostResult;
}
