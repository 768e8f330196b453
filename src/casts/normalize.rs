//! Raw upstream record → canonical [`Cast`].
//!
//! Upstream payloads have come in several shapes over time (`hash` vs `id`,
//! `text` vs `content`, author nested or flattened, reactions nested or
//! flattened, counts as numbers or reactor lists). Each field is read through
//! an ordered list of JSON pointers; the first rule that yields a usable value
//! wins. The lists below are the whole contract.

use serde_json::Value;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use super::types::{Author, Cast, Engagement, Link};

pub const ID_RULES: &[&str] = &["/hash", "/id"];
pub const TEXT_RULES: &[&str] = &["/text", "/content"];
pub const TIMESTAMP_RULES: &[&str] = &["/timestamp", "/published_at", "/publishedAt", "/created_at"];

pub const AUTHOR_ID_RULES: &[&str] = &["/author/fid", "/fid"];
pub const HANDLE_RULES: &[&str] = &["/author/username", "/username"];
pub const DISPLAY_NAME_RULES: &[&str] = &[
    "/author/display_name",
    "/author/displayName",
    "/display_name",
    "/displayName",
];
pub const AVATAR_RULES: &[&str] = &["/author/pfp_url", "/author/pfp/url", "/pfp_url", "/pfp/url"];

pub const LIKES_RULES: &[&str] = &[
    "/reactions/likes_count",
    "/reactions/likes",
    "/likes_count",
    "/likes",
];
pub const RECASTS_RULES: &[&str] = &[
    "/reactions/recasts_count",
    "/reactions/recasts",
    "/recasts_count",
    "/recasts",
];
pub const REPLIES_RULES: &[&str] = &[
    "/replies/count",
    "/reactions/replies",
    "/replies_count",
    "/replies",
];

pub const LINKS_RULE: &str = "/embeds";

/// Numeric timestamps below this are seconds, not milliseconds.
pub const SECONDS_THRESHOLD: i64 = 10_000_000_000;

const DEFAULT_HANDLE: &str = "unknown";
const DEFAULT_DISPLAY_NAME: &str = "Unknown";

/// What to do with a record that carries no usable timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingTimestamp {
    Skip,
    DefaultTo(i64),
}

/// Normalize one raw record. Returns `None` only when the timestamp is
/// missing and `missing` is [`MissingTimestamp::Skip`].
pub fn normalize_cast(raw: &Value, missing: MissingTimestamp) -> Option<Cast> {
    let published_at = match (published_at(raw), missing) {
        (Some(ts), _) => ts,
        (None, MissingTimestamp::DefaultTo(now_ms)) => now_ms,
        (None, MissingTimestamp::Skip) => return None,
    };

    Some(Cast {
        id: first_string(raw, ID_RULES).unwrap_or_default(),
        text: first_string(raw, TEXT_RULES).unwrap_or_default(),
        author: Author {
            id: first_count(raw, AUTHOR_ID_RULES).unwrap_or(0),
            handle: first_string(raw, HANDLE_RULES).unwrap_or_else(|| DEFAULT_HANDLE.into()),
            display_name: first_string(raw, DISPLAY_NAME_RULES)
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.into()),
            avatar_url: first_string(raw, AVATAR_RULES).unwrap_or_default(),
        },
        engagement: Engagement {
            likes: first_count(raw, LIKES_RULES).unwrap_or(0),
            recasts: first_count(raw, RECASTS_RULES).unwrap_or(0),
            replies: first_count(raw, REPLIES_RULES).unwrap_or(0),
        },
        published_at,
        links: links(raw),
        score: None,
    })
}

/// Epoch milliseconds from the first present timestamp field.
///
/// A present but unparseable value yields `None`; later fields are not
/// consulted.
pub fn published_at(raw: &Value) -> Option<i64> {
    let value = TIMESTAMP_RULES
        .iter()
        .filter_map(|p| raw.pointer(p))
        .find(|v| is_present(v))?;
    let ts = match value {
        Value::String(s) => parse_timestamp_str(s)?,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    Some(to_millis(ts))
}

pub fn to_millis(ts: i64) -> i64 {
    if ts < SECONDS_THRESHOLD {
        ts.saturating_mul(1000)
    } else {
        ts
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(unix_millis(dt));
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Some(unix_millis(dt));
    }
    s.parse::<i64>().ok()
}

fn unix_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

// null, "", 0 and false count as absent
fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

fn first_string(raw: &Value, rules: &[&str]) -> Option<String> {
    rules.iter().find_map(|p| match raw.pointer(p)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_count(raw: &Value, rules: &[&str]) -> Option<u64> {
    rules.iter().find_map(|p| count_of(raw.pointer(p)?))
}

fn count_of(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::Array(items) => Some(items.len() as u64),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn links(raw: &Value) -> Vec<Link> {
    raw.pointer(LINKS_RULE)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|it| Link {
                    url: it.get("url").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_500_000;

    #[test]
    fn seconds_are_scaled_to_millis() {
        assert_eq!(to_millis(1_700_000_000), 1_700_000_000_000);
        assert_eq!(to_millis(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(to_millis(SECONDS_THRESHOLD), SECONDS_THRESHOLD);
        assert_eq!(to_millis(SECONDS_THRESHOLD - 1), (SECONDS_THRESHOLD - 1) * 1000);
    }

    #[test]
    fn timestamp_priority_order() {
        let raw = json!({ "created_at": 1, "publishedAt": 2, "published_at": 3, "timestamp": 4 });
        assert_eq!(published_at(&raw), Some(4_000));
        let raw = json!({ "created_at": 1, "publishedAt": 2, "published_at": 3 });
        assert_eq!(published_at(&raw), Some(3_000));
        let raw = json!({ "created_at": 1, "publishedAt": 2 });
        assert_eq!(published_at(&raw), Some(2_000));
        let raw = json!({ "created_at": 1 });
        assert_eq!(published_at(&raw), Some(1_000));
        assert_eq!(published_at(&json!({})), None);
    }

    #[test]
    fn falsy_timestamp_falls_through() {
        let raw = json!({ "timestamp": null, "published_at": "", "created_at": 1_700_000_000 });
        assert_eq!(published_at(&raw), Some(1_700_000_000_000));
    }

    #[test]
    fn string_timestamps_parse() {
        let raw = json!({ "timestamp": "2023-11-14T22:13:20.000Z" });
        assert_eq!(published_at(&raw), Some(1_700_000_000_000));
        let raw = json!({ "timestamp": "Tue, 14 Nov 2023 22:13:20 +0000" });
        assert_eq!(published_at(&raw), Some(1_700_000_000_000));
        let raw = json!({ "timestamp": "1700000000" });
        assert_eq!(published_at(&raw), Some(1_700_000_000_000));
        let raw = json!({ "timestamp": "yesterday-ish", "created_at": 5 });
        assert_eq!(published_at(&raw), None);
    }

    #[test]
    fn nested_neynar_shape() {
        let raw = json!({
            "hash": "0xabc",
            "text": "gm",
            "timestamp": "2023-11-14T22:13:20Z",
            "author": {
                "fid": 3,
                "username": "dwr",
                "display_name": "Dan",
                "pfp_url": "https://img/dwr.png"
            },
            "reactions": { "likes_count": 10, "recasts_count": 2, "likes": [{}, {}] },
            "replies": { "count": 4 },
            "embeds": [{ "url": "https://a.b" }, { "cast_id": {} }]
        });
        let c = normalize_cast(&raw, MissingTimestamp::Skip).unwrap();
        assert_eq!(c.id, "0xabc");
        assert_eq!(c.text, "gm");
        assert_eq!(c.author.id, 3);
        assert_eq!(c.author.handle, "dwr");
        assert_eq!(c.author.display_name, "Dan");
        assert_eq!(c.author.avatar_url, "https://img/dwr.png");
        assert_eq!(c.engagement, Engagement { likes: 10, recasts: 2, replies: 4 });
        assert_eq!(c.links.len(), 2);
        assert_eq!(c.links[0].url.as_deref(), Some("https://a.b"));
        assert_eq!(c.links[1].url, None);
        assert!(c.score.is_none());
    }

    #[test]
    fn flattened_legacy_shape() {
        let raw = json!({
            "id": "c-1",
            "content": "hello",
            "publishedAt": 1_700_000_000_000_i64,
            "fid": 42,
            "username": "alice",
            "displayName": "Alice",
            "pfp": { "url": "https://img/alice.png" },
            "likes": 5,
            "recasts": 1,
            "replies": 2
        });
        let c = normalize_cast(&raw, MissingTimestamp::Skip).unwrap();
        assert_eq!(c.id, "c-1");
        assert_eq!(c.text, "hello");
        assert_eq!(c.author.id, 42);
        assert_eq!(c.author.handle, "alice");
        assert_eq!(c.author.display_name, "Alice");
        assert_eq!(c.author.avatar_url, "https://img/alice.png");
        assert_eq!(c.engagement, Engagement { likes: 5, recasts: 1, replies: 2 });
        assert_eq!(c.published_at, 1_700_000_000_000);
    }

    #[test]
    fn malformed_record_gets_defaults() {
        let raw = json!({ "likes": -3, "recasts": "x", "embeds": "nope" });
        let c = normalize_cast(&raw, MissingTimestamp::DefaultTo(NOW)).unwrap();
        assert_eq!(c.id, "");
        assert_eq!(c.text, "");
        assert_eq!(c.author.handle, "unknown");
        assert_eq!(c.author.display_name, "Unknown");
        assert_eq!(c.engagement, Engagement::default());
        assert_eq!(c.published_at, NOW);
        assert!(c.links.is_empty());

        assert!(normalize_cast(&raw, MissingTimestamp::Skip).is_none());
        assert!(normalize_cast(&Value::Null, MissingTimestamp::DefaultTo(NOW)).is_some());
    }
}
