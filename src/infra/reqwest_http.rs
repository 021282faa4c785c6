//! Reqwest-backed adapters for the `FeedFetch` and `HookPost` ports.
use reqwest::header;
use tracing::{debug, warn};

use crate::feed::parser::parse_and_normalize;
use crate::ports::http::{FeedFetch, FetchError, FetchedFeed, HookPost, PostResult, RetryAfter};

pub const USER_AGENT: &str = concat!("feedforward/", env!("CARGO_PKG_VERSION"));

const FETCH_TIMEOUT_SECS: u64 = 30;
const DELIVER_TIMEOUT_SECS: u64 = 15;

pub struct ReqwestFeedFetch {
    client: reqwest::Client,
}

impl ReqwestFeedFetch {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_idle_timeout(std::time::Duration::from_secs(120))
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FeedFetch for ReqwestFeedFetch {
    async fn fetch(&self, url: &str, now_ms: i64) -> Result<FetchedFeed, FetchError> {
        debug!(url, "feed fetch start");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Upstream(status));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_and_normalize(&bytes, now_ms).map_err(FetchError::Parse)
    }
}

pub struct ReqwestHookPost {
    client: reqwest::Client,
}

impl ReqwestHookPost {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_idle_timeout(std::time::Duration::from_secs(120))
            .timeout(std::time::Duration::from_secs(DELIVER_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HookPost for ReqwestHookPost {
    async fn post(&self, url: &str, body: &str) -> PostResult {
        match self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
        {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let retry_after = resp
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                debug!(url, status, "webhook post done");
                PostResult {
                    status: Some(status),
                    retry_after,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url, error = %e, "webhook post failed");
                PostResult {
                    status: None,
                    retry_after: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Retry-After arrives either as delay seconds or as an HTTP-date.
fn parse_retry_after(value: &str) -> Option<RetryAfter> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Some(RetryAfter::Delay(secs.max(0) * 1000));
    }
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| RetryAfter::Until(dt.timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("5"), Some(RetryAfter::Delay(5000)));
        assert_eq!(parse_retry_after(" 0 "), Some(RetryAfter::Delay(0)));
    }

    #[test]
    fn retry_after_http_date() {
        let parsed = parse_retry_after("Thu, 22 Aug 2024 12:00:00 GMT").unwrap();
        assert_eq!(parsed, RetryAfter::Until(1_724_328_000_000));
    }

    #[test]
    fn retry_after_garbage_is_ignored() {
        assert_eq!(parse_retry_after("soon"), None);
    }
}
