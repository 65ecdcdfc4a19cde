//! Defensive decoding of model text into structured data.
//!
//! Producers call [`decode_json`] (or [`decode_as`]) on raw model output and
//! propagate the [`DecodeError`] with `?`. The guard recognises that error
//! type and classifies the attempt as a parse failure; any other error a
//! producer returns is treated as unrelated and passed straight through.
//!
//! Strategies (in order):
//! 1. Strip `<think>` / `<thinking>` blocks
//! 2. Direct parse of the cleaned text
//! 3. Fenced code block (`` ```json `` or bare `` ``` ``)
//! 4. Bracket-match a JSON object, then a JSON array

use crate::diagnostic::{truncate, MAX_RAW_OUTPUT_CHARS};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Model text could not be decoded into structured data.
///
/// `raw_text` is truncated to [`MAX_RAW_OUTPUT_CHARS`] when the error is
/// built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("could not decode model output: {message}")]
pub struct DecodeError {
    message: String,
    raw_text: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>, raw_text: impl AsRef<str>) -> Self {
        Self {
            message: message.into(),
            raw_text: truncate(raw_text.as_ref(), MAX_RAW_OUTPUT_CHARS),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending text (bounded).
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Decode model text into a JSON value.
///
/// # Examples
///
/// ```
/// use llm_guard::decode::decode_json;
///
/// let value = decode_json("<think>hmm</think>Sure: {\"ok\": true}").unwrap();
/// assert_eq!(value["ok"], true);
/// assert!(decode_json("no structure here").is_err());
/// ```
pub fn decode_json(text: &str) -> Result<Value, DecodeError> {
    let cleaned = strip_think_tags(text);
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(DecodeError::new("empty model output", text));
    }

    let direct_err = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(block) = fenced_block(cleaned) {
        return serde_json::from_str::<Value>(block).map_err(|e| {
            DecodeError::new(format!("fenced block is not valid JSON: {}", e), text)
        });
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(candidate) = find_bracketed(cleaned, open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Ok(value);
            }
        }
    }

    Err(DecodeError::new(
        format!("no JSON value found: {}", direct_err),
        text,
    ))
}

/// Decode a value that is expected to carry model text.
///
/// Fails when `value` is not a string.
pub fn decode_text_value(value: &Value) -> Result<Value, DecodeError> {
    match value {
        Value::String(text) => decode_json(text),
        other => Err(DecodeError::new(
            format!("expected text, got {}", crate::schema::type_name(other)),
            other.to_string(),
        )),
    }
}

/// Decode model text straight into a typed `T`.
///
/// Both malformed JSON and JSON of the wrong shape are decode failures.
pub fn decode_as<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let value = decode_json(text)?;
    serde_json::from_value(value)
        .map_err(|e| DecodeError::new(format!("JSON has the wrong shape: {}", e), text))
}

/// Decode YAML model text into a JSON value (feature: `yaml`).
#[cfg(feature = "yaml")]
pub fn decode_yaml(text: &str) -> Result<Value, DecodeError> {
    let cleaned = strip_think_tags(text);
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(DecodeError::new("empty model output", text));
    }

    let body = fenced_block(cleaned).unwrap_or(cleaned);
    serde_yaml::from_str::<Value>(body)
        .map_err(|e| DecodeError::new(format!("invalid YAML: {}", e), text))
}

/// Remove `<think>...</think>` and `<thinking>...</thinking>` blocks.
/// An unclosed block swallows the rest of the text.
fn strip_think_tags(text: &str) -> String {
    let mut result = text.to_string();
    for (open, close) in [("<think>", "</think>"), ("<thinking>", "</thinking>")] {
        while let Some(start) = result.find(open) {
            match result[start..].find(close) {
                Some(offset) => {
                    let end = start + offset + close.len();
                    result.replace_range(start..end, "");
                }
                None => {
                    result.truncate(start);
                    break;
                }
            }
        }
    }
    result
}

/// Body of the first fenced code block, skipping the language hint line.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First balanced `open ... close` span, ignoring brackets inside strings.
fn find_bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}


#[cfg(all(test, feature = "yaml"))]
mod yaml_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_yaml() {
        let value = decode_yaml("title: Heat\nyear: 1995\n").unwrap();
        assert_eq!(value, json!({"title": "Heat", "year": 1995}));
    }

    #[test]
    fn test_fenced_yaml_after_thinking() {
        let text = "<think>list it</think>Here you go:\n```yaml\ntags:\n  - crime\n  - drama\n```";
        let value = decode_yaml(text).unwrap();
        assert_eq!(value, json!({"tags": ["crime", "drama"]}));
    }

    #[test]
    fn test_empty_yaml_is_error() {
        let err = decode_yaml("<think>nothing</think>  ").unwrap_err();
        assert_eq!(err.message(), "empty model output");
    }

    #[test]
    fn test_invalid_yaml_keeps_raw_text() {
        let err = decode_yaml("title: [unclosed").unwrap_err();
        assert!(err.message().starts_with("invalid YAML"));
        assert_eq!(err.raw_text(), "title: [unclosed");
    }
}
