//! Deterministic item identity for deduplication.
use sha2::{Digest, Sha256};

/// Derives the dedup identity of a feed item: the feed-supplied GUID when
/// non-empty, else the item link, else a hash over title and timestamp.
pub fn item_id(guid: Option<&str>, link: Option<&str>, title: &str, published_ms: i64) -> String {
    if let Some(g) = guid {
        let g = g.trim();
        if !g.is_empty() {
            return g.to_string();
        }
    }
    if let Some(l) = link {
        let l = l.trim();
        if !l.is_empty() {
            return l.to_string();
        }
    }
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(published_ms.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_guid_over_link() {
        let id = item_id(Some("guid-1"), Some("https://x/post"), "t", 0);
        assert_eq!(id, "guid-1");
    }

    #[test]
    fn blank_guid_falls_back_to_link() {
        let id = item_id(Some("  "), Some("https://x/post"), "t", 0);
        assert_eq!(id, "https://x/post");
    }

    #[test]
    fn hash_fallback_is_stable() {
        let a = item_id(None, None, "title", 1_700_000_000_000);
        let b = item_id(None, None, "title", 1_700_000_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_fallback_varies_with_timestamp() {
        let a = item_id(None, None, "title", 1);
        let b = item_id(None, None, "title", 2);
        assert_ne!(a, b);
    }
}
