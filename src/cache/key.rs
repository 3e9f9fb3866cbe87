//! Cache Key Module
//!
//! Normalizes request URLs into cache keys and derives the resource prefix
//! used for invalidation after a mutation.

use std::fmt::Display;

use serde_json::{Map, Value};

// == Build Key ==
/// Composes a cache key from a path and optional query parameters.
///
/// `None` values are dropped. The remaining pairs are sorted by name (stable,
/// so repeated names keep their relative order) and appended as
/// `path?a=1&b=2`. With no surviving parameters the path is returned as is.
pub fn build_key<I, K, V>(path: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: Display,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.as_ref().to_string(), v.to_string())))
        .collect();

    if pairs.is_empty() {
        return path.to_string();
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let query = pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", path, query)
}

/// [`build_key`] for a JSON parameter object.
///
/// `null` values are excluded and strings render without quotes.
pub fn build_key_from_json(path: &str, params: &Map<String, Value>) -> String {
    build_key(
        path,
        params.iter().map(|(name, value)| (name, json_param(value))),
    )
}

fn json_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// == Query Pairs ==
/// Splits a raw query string into `(name, value)` pairs without decoding.
///
/// Values stay percent-encoded, so `a=1%26b%3D2` (one parameter) and
/// `a=1&b=2` (two) never normalize to the same key. Empty segments are
/// skipped; a bare name yields an empty value.
pub fn query_pairs(query: &str) -> Vec<(&str, Option<&str>)> {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (segment, Some("")),
        })
        .collect()
}

// == Resource Prefix ==
/// Returns everything up to (not including) the second `/`.
///
/// `/events/123/rsvp` yields `/events`; `/users` has no second separator
/// and is returned whole.
pub fn resource_prefix(url: &str) -> &str {
    let second = url
        .char_indices()
        .filter(|(_, c)| *c == '/')
        .nth(1)
        .map(|(idx, _)| idx);

    match second {
        Some(idx) => &url[..idx],
        None => url,
    }
}
