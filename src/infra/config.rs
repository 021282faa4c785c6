//! Loads the TOML configuration file and normalizes it into the typed model.
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::domain::model::{AppConfig, Config, FeedConfig, WebhookConfig};

pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    app: RawApp,
    #[serde(default)]
    webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    feeds: Vec<FeedConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawApp {
    oldest: Option<u64>,
    ticker: Option<u64>,
    logger_level: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let raw: RawFile = toml::from_str(&content)?;

        let logger_level = raw
            .app
            .logger_level
            .unwrap_or_else(|| "info".to_string());
        normalize_level(&logger_level)?;

        let cfg = Config {
            app: AppConfig {
                oldest_secs: raw.app.oldest.unwrap_or(86_400),
                ticker_secs: raw.app.ticker.unwrap_or(600),
                logger_level,
            },
            webhooks: raw.webhooks,
            feeds: raw.feeds,
        };
        validate(&cfg)?;
        Ok(cfg)
    }
}

/// Duplicate names and dangling webhook references are fatal. An unused
/// webhook is not: the supervisor warns about those at startup.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let mut webhook_names = HashSet::new();
    for w in &cfg.webhooks {
        if w.name.trim().is_empty() {
            return Err(ConfigError::Invalid("webhook with empty name".into()));
        }
        if !webhook_names.insert(w.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate webhook name '{}'",
                w.name
            )));
        }
    }

    let mut feed_names = HashSet::new();
    for f in &cfg.feeds {
        if f.name.trim().is_empty() {
            return Err(ConfigError::Invalid("feed with empty name".into()));
        }
        if !feed_names.insert(f.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate feed name '{}'",
                f.name
            )));
        }
        if f.webhooks.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "feed '{}' targets no webhooks",
                f.name
            )));
        }
        for target in &f.webhooks {
            if !webhook_names.contains(target.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "invalid webhook name '{}' for feed '{}'",
                    target, f.name
                )));
            }
        }
    }
    Ok(())
}

fn normalize_level(level: &str) -> Result<(), ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "invalid logger_level '{other}', expected debug|info|warn|error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Config, ConfigError> {
        let raw: RawFile = toml::from_str(s).map_err(ConfigError::Toml)?;
        let cfg = Config {
            app: AppConfig {
                oldest_secs: raw.app.oldest.unwrap_or(86_400),
                ticker_secs: raw.app.ticker.unwrap_or(600),
                logger_level: raw.app.logger_level.unwrap_or_else(|| "info".into()),
            },
            webhooks: raw.webhooks,
            feeds: raw.feeds,
        };
        validate(&cfg)?;
        Ok(cfg)
    }

    const GOOD: &str = r#"
[app]
oldest = 3600
ticker = 60

[[webhooks]]
name = "hook1"
url = "https://example.com/hook"

[[feeds]]
name = "feed1"
url = "https://example.com/feed"
webhooks = ["hook1"]
"#;

    #[test]
    fn parses_and_applies_defaults() {
        let cfg = parse(GOOD).unwrap();
        assert_eq!(cfg.app.oldest_secs, 3600);
        assert_eq!(cfg.app.ticker_secs, 60);
        assert_eq!(cfg.app.logger_level, "info");
        assert_eq!(cfg.feeds[0].webhooks, vec!["hook1".to_string()]);
        assert!(!cfg.feeds[0].disabled);
    }

    #[test]
    fn rejects_unknown_webhook_reference() {
        let bad = GOOD.replace("webhooks = [\"hook1\"]", "webhooks = [\"nope\"]");
        assert!(matches!(parse(&bad), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_duplicate_feed_names() {
        let bad = format!(
            "{GOOD}\n[[feeds]]\nname = \"feed1\"\nurl = \"https://x\"\nwebhooks = [\"hook1\"]\n"
        );
        assert!(matches!(parse(&bad), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bad_logger_level() {
        let bad = format!("{}\nlogger_level = \"loud\"\n", "[app]");
        let with_rest = format!(
            "{bad}\n[[webhooks]]\nname = \"h\"\nurl = \"u\"\n[[feeds]]\nname = \"f\"\nurl = \"u\"\nwebhooks = [\"h\"]\n"
        );
        let raw: RawFile = toml::from_str(&with_rest).unwrap();
        assert!(normalize_level(raw.app.logger_level.as_deref().unwrap()).is_err());
    }
}
