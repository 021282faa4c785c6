//! Converts a normalized feed item into a webhook message, applying the
//! platform's length limits deterministically.
use crate::domain::model::{FeedConfig, NormalizedItem};
use crate::hook::payload::{AllowedMentions, Embed, EmbedAuthor, HookPayload};
use crate::infra::time::epoch_ms_to_rfc3339_utc;

pub const MAX_EMBED_TITLE: usize = 256;
pub const MAX_EMBED_DESCRIPTION: usize = 4096;
pub const MAX_PAYLOAD: usize = 6000;

/// Renders one item for every webhook of `feed`. Pure: the same inputs always
/// yield the same payload.
pub fn render(item: &NormalizedItem, feed_title: &str, feed: &FeedConfig) -> HookPayload {
    let content = match &feed.prefix {
        Some(p) => format!("{p}{feed_title}"),
        None => feed_title.to_string(),
    };

    let description = item
        .content_html
        .as_deref()
        .map(html2md::parse_html)
        .map(|md| truncate_markdown(&md, MAX_EMBED_DESCRIPTION))
        .filter(|md| !md.is_empty());

    let embed = Embed {
        title: Some(truncate_ellipsis(&item.title, MAX_EMBED_TITLE)),
        url: item.link.clone(),
        description,
        timestamp: Some(epoch_ms_to_rfc3339_utc(item.published_ms)),
        author: item
            .author
            .clone()
            .map(|name| EmbedAuthor { name }),
    };

    let mut payload = HookPayload {
        content: Some(content),
        username: feed.username.clone(),
        avatar_url: feed.avatar_url.clone(),
        allowed_mentions: AllowedMentions::default(),
        embeds: vec![embed],
    };
    enforce_total_limit(&mut payload);
    payload
}

/// Keeps the serialized payload within the platform's total character limit
/// by shaving the embed description.
fn enforce_total_limit(payload: &mut HookPayload) {
    loop {
        let serialized = serde_json::to_string(payload).unwrap_or_default();
        let over = serialized.chars().count().saturating_sub(MAX_PAYLOAD);
        if over == 0 {
            return;
        }
        let embed = match payload.embeds.first_mut() {
            Some(e) => e,
            None => return,
        };
        let desc = match embed.description.take() {
            Some(d) => d,
            None => return,
        };
        let keep = desc.chars().count().saturating_sub(over);
        let cut = truncate_markdown(&desc, keep);
        if cut.is_empty() {
            return;
        }
        embed.description = Some(cut);
    }
}

/// Truncates to `max` characters, replacing the last kept character with an
/// ellipsis when anything was removed.
pub fn truncate_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Truncates to `max` characters at a safe boundary: the cut never lands
/// between a Markdown escape backslash and the character it escapes.
pub fn truncate_markdown(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    while trailing_backslashes(&out) % 2 == 1 {
        out.pop();
    }
    out
}

fn trailing_backslashes(s: &str) -> usize {
    s.chars().rev().take_while(|c| *c == '\\').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> FeedConfig {
        FeedConfig {
            name: "blog".into(),
            url: "https://example.com/feed".into(),
            webhooks: vec!["hook1".into()],
            disabled: false,
            username: None,
            avatar_url: None,
            prefix: None,
        }
    }

    fn item() -> NormalizedItem {
        NormalizedItem {
            id: "post-1".into(),
            title: "First post".into(),
            link: Some("https://example.com/1".into()),
            content_html: Some("<p>Hello <b>world</b></p>".into()),
            published_ms: 1_724_328_000_000,
            author: Some("alice".into()),
        }
    }

    #[test]
    fn renders_basic_payload() {
        let p = render(&item(), "Example Blog", &feed());
        assert_eq!(p.content.as_deref(), Some("Example Blog"));
        assert!(p.allowed_mentions.parse.is_empty());
        let e = &p.embeds[0];
        assert_eq!(e.title.as_deref(), Some("First post"));
        assert_eq!(e.url.as_deref(), Some("https://example.com/1"));
        assert_eq!(e.timestamp.as_deref(), Some("2024-08-22T12:00:00+00:00"));
        assert_eq!(e.author.as_ref().unwrap().name, "alice");
        assert!(e.description.as_deref().unwrap().contains("Hello"));
        assert!(e.description.as_deref().unwrap().contains("**world**"));
    }

    #[test]
    fn branding_overrides_flow_through() {
        let mut f = feed();
        f.username = Some("Blog Bot".into());
        f.prefix = Some("[news] ".into());
        let p = render(&item(), "Example Blog", &f);
        assert_eq!(p.username.as_deref(), Some("Blog Bot"));
        assert_eq!(p.content.as_deref(), Some("[news] Example Blog"));
    }

    #[test]
    fn long_title_is_ellipsized_to_256() {
        let mut it = item();
        it.title = "x".repeat(300);
        let p = render(&it, "t", &feed());
        let title = p.embeds[0].title.as_deref().unwrap();
        assert_eq!(title.chars().count(), 256);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn long_description_is_cut_to_4096() {
        let mut it = item();
        it.content_html = Some(format!("<p>{}</p>", "y".repeat(10_000)));
        let p = render(&it, "t", &feed());
        assert!(p.embeds[0].description.as_deref().unwrap().chars().count() <= 4096);
    }

    #[test]
    fn cut_never_splits_an_escape() {
        let md = format!("{}\\*", "a".repeat(4095));
        let cut = truncate_markdown(&md, 4096);
        assert!(!cut.ends_with('\\'));
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = serde_json::to_string(&render(&item(), "Example Blog", &feed())).unwrap();
        let b = serde_json::to_string(&render(&item(), "Example Blog", &feed())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn total_payload_stays_under_limit() {
        let mut it = item();
        // A description that survives the 4096 cut but blows the 6000 total
        // once JSON escaping doubles every quote.
        it.content_html = Some(format!("<p>{}</p>", "\"q\" ".repeat(1500)));
        it.title = "t".repeat(256);
        let p = render(&it, "t", &feed());
        let serialized = serde_json::to_string(&p).unwrap();
        assert!(serialized.chars().count() <= MAX_PAYLOAD);
    }
}
