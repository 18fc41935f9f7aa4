//! Backend response validation
//!
//! Structured replies are parsed leniently: the first well-formed JSON object
//! wins, anything else is a `ParseError` the caller folds into its fallback.

mod json_repair;

pub use json_repair::{JsonRepairer, extract_json_object};

/// Trim a free-text reply into a single usable line of prose.
///
/// Strips wrapping quotes, a leading list marker and a `Question:` label.
/// Returns `None` when nothing is left.
pub fn clean_question(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    for prefix in ["Question:", "question:", "Q:"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
        }
    }
    for marker in ["- ", "* ", "1. ", "1) "] {
        if let Some(rest) = text.strip_prefix(marker) {
            text = rest.trim_start();
        }
    }
    let text = text
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim();

    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_question() {
        assert_eq!(
            clean_question("  \"Who will use it?\"  ").as_deref(),
            Some("Who will use it?")
        );
        assert_eq!(
            clean_question("Question: 1. What platforms?").as_deref(),
            Some("What platforms?")
        );
        assert_eq!(clean_question("   "), None);
        assert_eq!(clean_question("\"\""), None);
    }

    #[test]
    fn test_clean_question_keeps_inner_text() {
        let raw = "What does \"minimal\" mean for you?";
        assert_eq!(clean_question(raw).as_deref(), Some(raw));
    }
}
