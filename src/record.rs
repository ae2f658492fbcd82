//! The post record and its cache key
//!
//! Records travel between tiers as a field-named JSON object:
//! `{"id":5,"title":"...","body":"...","userId":1}`. Every field is
//! required; absent or null fields fail to decode instead of defaulting.

use serde::{Deserialize, Serialize};

/// Prefix of every cache key (`post:<id>`)
pub const KEY_PREFIX: &str = "post:";

/// A post, identified by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Reference to the owning user; not validated locally
    #[serde(rename = "userId")]
    pub owner_id: i64,
}

impl Record {
    pub fn new(id: i64, title: impl Into<String>, body: impl Into<String>, owner_id: i64) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            owner_id,
        }
    }

    /// Cache key for this record
    pub fn cache_key(&self) -> String {
        cache_key(self.id)
    }

    /// Encode as field-named JSON
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from field-named JSON
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Build the cache key for an id
pub fn cache_key(id: i64) -> String {
    let mut buf = itoa::Buffer::new();
    let mut key = String::with_capacity(KEY_PREFIX.len() + 20);
    key.push_str(KEY_PREFIX);
    key.push_str(buf.format(id));
    key
}

/// Extract the id from a `post:<id>` key.
///
/// Only the canonical spelling produced by [`cache_key`] is accepted, so
/// `post:+5` and `post:005` are rejected rather than aliased to `post:5`.
pub fn parse_cache_key(key: &[u8]) -> Option<i64> {
    let digits = key.strip_prefix(KEY_PREFIX.as_bytes())?;
    let id: i64 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    let mut buf = itoa::Buffer::new();
    (buf.format(id).as_bytes() == digits).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(5), "post:5");
        assert_eq!(cache_key(-12), "post:-12");
        assert_eq!(Record::new(42, "t", "b", 1).cache_key(), "post:42");
    }

    #[test]
    fn test_parse_cache_key() {
        assert_eq!(parse_cache_key(b"post:5"), Some(5));
        assert_eq!(parse_cache_key(b"post:"), None);
        assert_eq!(parse_cache_key(b"post:abc"), None);
        assert_eq!(parse_cache_key(b"user:5"), None);
        assert_eq!(parse_cache_key(b"5"), None);
    }

    #[test]
    fn test_parse_cache_key_rejects_aliases() {
        assert_eq!(parse_cache_key(b"post:-12"), Some(-12));
        assert_eq!(parse_cache_key(b"post:0"), Some(0));
        assert_eq!(parse_cache_key(b"post:+5"), None);
        assert_eq!(parse_cache_key(b"post:005"), None);
        assert_eq!(parse_cache_key(b"post:-0"), None);
    }

    #[test]
    fn test_json_uses_field_names() {
        let record = Record::new(5, "T", "B", 1);
        let json = String::from_utf8(record.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"id":5,"title":"T","body":"B","userId":1}"#);
    }

    #[test]
    fn test_json_ignores_field_order_and_extras() {
        let record =
            Record::from_json(br#"{"userId":1,"body":"B","extra":true,"title":"T","id":5}"#).unwrap();
        assert_eq!(record, Record::new(5, "T", "B", 1));
    }

    #[test]
    fn test_missing_or_null_field_is_rejected() {
        assert!(Record::from_json(br#"{"id":5,"title":"T","body":"B"}"#).is_err());
        assert!(Record::from_json(br#"{"id":5,"title":null,"body":"B","userId":1}"#).is_err());
        assert!(Record::from_json(b"not json").is_err());
    }
}
