use serde::{Deserialize, Serialize};

/// Global service settings from the `[app]` table.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Freshness horizon in seconds: items older than this are never delivered.
    pub oldest_secs: u64,
    /// Poll interval in seconds; each tick gets fresh jitter.
    pub ticker_secs: u64,
    pub logger_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub webhooks: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Optional webhook display-name override for this feed.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Optional prefix prepended to the message content line.
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub webhooks: Vec<WebhookConfig>,
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| !f.disabled)
    }
}

/// Feed-level metadata from the last successful fetch.
#[derive(Debug, Clone, Default)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub link: Option<String>,
    pub icon_url: Option<String>,
}

/// One feed entry after normalization. `id` is stable across restarts and is
/// the deduplication key together with the feed name.
#[derive(Debug, Clone)]
pub struct NormalizedItem {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub content_html: Option<String>,
    pub published_ms: i64,
    pub author: Option<String>,
}
