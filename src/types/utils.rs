//! Shared utility functions for JSON extraction and text handling.
//!
//! ## JSON Extraction Helpers
//!
//! Provides ergonomic helpers for extracting values from `serde_json::Value`:
//! - `json_string` - Extract a non-blank string
//! - `json_string_list` - Extract a string list (arrays, or comma-separated strings)

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract a trimmed, non-blank string from JSON value by key.
///
/// Numbers and booleans are rendered as text.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Extract a string list from JSON value by key.
///
/// Arrays keep their string items; a plain string is split on commas.
/// Returns `None` when nothing usable remains.
pub fn json_string_list(value: &Value, key: &str) -> Option<Vec<String>> {
    let items = match value.get(key)? {
        Value::Array(arr) => arr
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_list(s),
        _ => return None,
    };
    (!items.is_empty()).then_some(items)
}

// =============================================================================
// String Utilities
// =============================================================================

/// Split free text on commas into trimmed, non-empty items
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Lowercase kebab-case slug built from the first `max_words` words
pub fn slugify(text: &str, max_words: usize) -> String {
    let lowered = text.to_lowercase();
    NON_SLUG
        .split(&lowered)
        .filter(|w| !w.is_empty())
        .take(max_words)
        .collect::<Vec<_>>()
        .join("-")
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_string() {
        let v = json!({"a": " hi ", "b": "", "c": 3, "d": null});
        assert_eq!(json_string(&v, "a").as_deref(), Some("hi"));
        assert_eq!(json_string(&v, "b"), None);
        assert_eq!(json_string(&v, "c").as_deref(), Some("3"));
        assert_eq!(json_string(&v, "d"), None);
        assert_eq!(json_string(&v, "missing"), None);
    }

    #[test]
    fn test_json_string_list() {
        let v = json!({"arr": ["x", " ", "y"], "csv": "a, b,,c", "empty": [], "obj": {}});
        assert_eq!(json_string_list(&v, "arr"), Some(vec!["x".into(), "y".into()]));
        assert_eq!(
            json_string_list(&v, "csv"),
            Some(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(json_string_list(&v, "empty"), None);
        assert_eq!(json_string_list(&v, "obj"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World! Again and again", 3), "hello-world-again");
        assert_eq!(slugify("  ", 3), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc…");
    }
}
