//! JSON extraction for backend responses
//!
//! Backends are asked for a bare JSON object but routinely wrap it in code
//! fences, surround it with prose, or get cut off mid-object. Extraction order:
//! 1. Fence-stripped text that parses directly as an object
//! 2. The first balanced `{...}` block in the text that parses as an object
//! 3. The text from the first `{` with trailing commas removed and closers added

use serde_json::Value;
use tracing::debug;

use crate::types::LlmError;

/// Extract the first usable JSON object from a backend response
pub fn extract_json_object(content: &str) -> Result<Value, LlmError> {
    JsonRepairer::new().parse_object(content).map(|(value, _)| value)
}

/// JSON object extraction with light repair
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Returns (object, was_repaired)
    pub fn parse_object(&self, raw: &str) -> Result<(Value, bool), LlmError> {
        let cleaned = preprocess(raw);
        if cleaned.is_empty() {
            return Err(LlmError::parse("empty response"));
        }

        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&cleaned) {
            return Ok((value, false));
        }

        if let Some(value) = first_object_block(&cleaned) {
            debug!("JSON object extracted from mixed content");
            return Ok((value, false));
        }

        if let Some(start) = cleaned.find('{') {
            let repaired = balance_brackets(&fix_trailing_commas(&cleaned[start..]));
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&repaired) {
                debug!("JSON object repaired");
                return Ok((value, true));
            }
        }

        Err(LlmError::parse(format!(
            "no JSON object in response: {}...",
            cleaned.chars().take(120).collect::<String>()
        )))
    }
}

fn preprocess(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{feff}');
    strip_code_fences(s).trim().to_string()
}

/// Strip a surrounding ```json ... ``` fence
fn strip_code_fences(s: &str) -> &str {
    let mut result = s;
    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = &result[first_newline + 1..];
    }
    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped;
    }
    result
}

/// Scan every `{` in order and return the first balanced block that parses as an object
fn first_object_block(s: &str) -> Option<Value> {
    s.char_indices()
        .filter(|(_, ch)| *ch == '{')
        .filter_map(|(start, _)| balanced_end(&s[start..]).map(|len| &s[start..start + len]))
        .find_map(|block| match serde_json::from_str::<Value>(block) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        })
}

/// Byte length of the balanced `{...}` block at the start of `s`
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop commas that directly precede `]` or `}`
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        result.push(ch);
    }
    result
}

/// Close an unterminated string and append missing closers in nesting order
fn balance_brackets(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut result = s.trim_end().to_string();
    if in_string {
        result.push('"');
    }
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}
