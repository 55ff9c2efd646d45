//! Redaction applied before anything is stored in the request log
//!
//! Redaction is irreversible: sensitive values are replaced with
//! [`REDACTED`] and the originals are never kept.

use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Marker written in place of a sensitive value
pub const REDACTED: &str = "[REDACTED]";

/// Header names whose values are always replaced (compared lowercase)
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "api-key", "x-api-key"];

/// Payload keys whose values are always replaced (compared normalized)
pub const SENSITIVE_KEYS: &[&str] = &["api_key", "apikey", "key", "token", "secret", "password"];

/// Suffixes that mark a compound key as sensitive (`access_token`, `client_secret`)
const SENSITIVE_SUFFIXES: &[&str] = &["_api_key", "_token", "_secret", "_password"];

static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").expect("static bearer pattern")
});

static KEY_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sk|pk)-[A-Za-z0-9_-]{8,}|\bhf_[A-Za-z0-9]{8,}").expect("static key pattern")
});

static QUERY_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:api[_-]?key|access_token|token|secret)=)[^&\s]+")
        .expect("static query pattern")
});

/// Whether a header name is on the denylist
pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&lower.as_str())
}

/// Whether a payload key names a secret
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase().replace('-', "_");
    SENSITIVE_KEYS.contains(&normalized.as_str())
        || SENSITIVE_SUFFIXES.iter().any(|s| normalized.ends_with(s))
}

/// Copy of `headers` with denylisted values replaced and the rest scrubbed
pub fn redact_headers(headers: &HashMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_string()
            } else {
                scrub_text(value).into_owned()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Copy of `value` with sensitive keys redacted at any depth
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::String(s) => Value::String(scrub_text(s).into_owned()),
        other => other.clone(),
    }
}

fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                Value::String(REDACTED.to_string())
            } else {
                redact_value(value)
            };
            (key.clone(), value)
        })
        .collect()
}

/// Mask credentials embedded in free text (bearer tokens, `sk-` keys,
/// `?api_key=` query parameters)
pub fn scrub_text(text: &str) -> Cow<'_, str> {
    if !text.contains(&['-', '_', '='][..]) && !text.to_ascii_lowercase().contains("bearer") {
        return Cow::Borrowed(text);
    }
    let mut scrubbed = BEARER
        .replace_all(text, format!("Bearer {}", REDACTED).as_str())
        .into_owned();
    scrubbed = KEY_LIKE.replace_all(&scrubbed, REDACTED).into_owned();
    scrubbed = QUERY_SECRET
        .replace_all(&scrubbed, format!("${{1}}{}", REDACTED).as_str())
        .into_owned();

    if scrubbed == text {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(scrubbed)
    }
}
