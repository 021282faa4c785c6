//! Parses RSS/Atom XML bytes into normalized items ready for dedup and dispatch.
use chrono::{DateTime, Utc};

use crate::domain::identity::item_id;
use crate::domain::model::{FeedMeta, NormalizedItem};
use crate::ports::http::FetchedFeed;

/// Accepts both RSS 2.0 and Atom. Missing published dates fall back to the
/// updated date, then to `now_ms`. Entries with no id, no link, and no title
/// are dropped since nothing stable could identify them.
pub fn parse_and_normalize(bytes: &[u8], now_ms: i64) -> Result<FetchedFeed, String> {
    let parsed = feed_rs::parser::parse(bytes).map_err(|e| format!("feed parse error: {e}"))?;

    let meta = FeedMeta {
        title: parsed.title.map(|t| t.content),
        link: parsed.links.first().map(|l| l.href.clone()),
        icon_url: parsed
            .icon
            .map(|i| i.uri)
            .or(parsed.logo.map(|l| l.uri)),
    };

    let mut items = Vec::new();
    for entry in parsed.entries {
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let link = entry.links.first().map(|l| l.href.clone());
        let guid = entry.id.trim().to_string();
        if guid.is_empty() && link.is_none() && title.trim().is_empty() {
            continue;
        }

        let published_ms = entry
            .published
            .map(to_ms)
            .or_else(|| entry.updated.map(to_ms))
            .unwrap_or(now_ms);

        let content_html = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .filter(|s| !s.trim().is_empty());

        let author = entry
            .authors
            .first()
            .map(|p| p.name.clone())
            .filter(|n| !n.trim().is_empty());

        let id = item_id(Some(&guid), link.as_deref(), &title, published_ms);
        items.push(NormalizedItem {
            id,
            title,
            link,
            content_html,
            published_ms,
            author,
        });
    }

    Ok(FetchedFeed { meta, items })
}

fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Blog</title>
  <link>https://example.com</link>
  <item>
    <guid>post-1</guid>
    <title>First post</title>
    <link>https://example.com/1</link>
    <pubDate>Thu, 22 Aug 2024 12:00:00 GMT</pubDate>
    <description>&lt;p&gt;Hello&lt;/p&gt;</description>
  </item>
  <item>
    <title>No date post</title>
    <link>https://example.com/2</link>
  </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <link href="https://example.org"/>
  <updated>2024-08-22T12:00:00Z</updated>
  <entry>
    <id>urn:entry:1</id>
    <title>Entry one</title>
    <link href="https://example.org/1"/>
    <updated>2024-08-22T11:00:00Z</updated>
    <author><name>alice</name></author>
    <content type="html">&lt;b&gt;body&lt;/b&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items() {
        let feed = parse_and_normalize(RSS.as_bytes(), 1_000).unwrap();
        assert_eq!(feed.meta.title.as_deref(), Some("Example Blog"));
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].id, "post-1");
        assert_eq!(feed.items[0].title, "First post");
        assert!(feed.items[0].content_html.as_deref().unwrap().contains("Hello"));
    }

    #[test]
    fn missing_date_falls_back_to_now() {
        let feed = parse_and_normalize(RSS.as_bytes(), 42_000).unwrap();
        assert_eq!(feed.items[1].published_ms, 42_000);
    }

    #[test]
    fn parses_atom_with_updated_fallback() {
        let feed = parse_and_normalize(ATOM.as_bytes(), 0).unwrap();
        assert_eq!(feed.items.len(), 1);
        let item = &feed.items[0];
        assert_eq!(item.id, "urn:entry:1");
        assert_eq!(item.author.as_deref(), Some("alice"));
        // No <published>, so <updated> supplies the timestamp.
        assert_eq!(item.published_ms, 1_724_324_400_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_and_normalize(b"not xml at all", 0).is_err());
    }
}
