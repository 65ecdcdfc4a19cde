//! Per-attempt failure diagnostics.
//!
//! A [`Diagnostic`] describes why one attempt failed: a schema-validation
//! failure (built from the first reported [`FieldError`]) or a decode
//! failure (built from a [`DecodeError`]). Diagnostics are immutable and
//! any raw payload is truncated when the diagnostic is built, so every
//! consumer (ledger, feedback, logs, serialized violations) sees a bounded
//! copy.

use crate::decode::DecodeError;
use crate::schema::{type_name, value_at, FieldError, Issue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Maximum length (in characters) of a raw payload kept in a diagnostic.
pub const MAX_RAW_OUTPUT_CHARS: usize = 500;

/// Maximum length of a received-value summary.
const MAX_RECEIVED_CHARS: usize = 100;

/// Failure kinds the guard can classify and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The output decoded but failed the output schema.
    Validation,
    /// The producer could not decode model text into structured data.
    Parse,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Validation => f.write_str("validation"),
            DiagnosticKind::Parse => f.write_str("parse"),
        }
    }
}

/// Immutable description of one failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DiagnosticWire")]
pub struct Diagnostic {
    kind: DiagnosticKind,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    received: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_output: Option<String>,
}

/// Deserialized form of a [`Diagnostic`]; converted so the raw payload bound
/// holds for diagnostics read back from JSON too.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticWire {
    kind: DiagnosticKind,
    message: String,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    received: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    raw_output: Option<String>,
}

impl From<DiagnosticWire> for Diagnostic {
    fn from(wire: DiagnosticWire) -> Self {
        Self {
            kind: wire.kind,
            message: wire.message,
            field: wire.field,
            expected: wire.expected,
            received: wire.received,
            suggestion: wire.suggestion,
            raw_output: wire
                .raw_output
                .map(|raw| truncate(&raw, MAX_RAW_OUTPUT_CHARS)),
        }
    }
}

impl Diagnostic {
    /// Build a validation diagnostic from a schema's error list.
    ///
    /// Only the first error is used. `output` is the value that failed; its
    /// JSON text becomes the (truncated) raw payload.
    pub fn from_validation(errors: &[FieldError], output: Option<&Value>) -> Self {
        match errors.first() {
            Some(first) => Self::from_field_error(first, output),
            None => Self {
                kind: DiagnosticKind::Validation,
                message: "value failed schema validation".to_string(),
                field: None,
                expected: None,
                received: output.map(summarize),
                suggestion: None,
                raw_output: output.map(|v| truncate(&v.to_string(), MAX_RAW_OUTPUT_CHARS)),
            },
        }
    }

    /// Build a validation diagnostic from a single field error.
    pub fn from_field_error(error: &FieldError, output: Option<&Value>) -> Self {
        let at_path = output.and_then(|v| value_at(v, &error.path));
        let (expected, received) = match &error.issue {
            Issue::TooSmall { minimum } => (Some(format!("at least {}", minimum)), None),
            Issue::TooBig { maximum } => (Some(format!("at most {}", maximum)), None),
            Issue::InvalidType { expected, received } => {
                (Some(expected.clone()), Some(received.clone()))
            }
            Issue::InvalidEnum { options } => (Some(options.join(" | ")), None),
            Issue::MissingField => (Some("a value".to_string()), Some("missing".to_string())),
            Issue::Custom => (None, None),
        };

        Self {
            kind: DiagnosticKind::Validation,
            message: error.message.clone(),
            field: error.field(),
            expected,
            received: received.or_else(|| at_path.map(summarize)),
            suggestion: Some(suggest(error)),
            raw_output: output.map(|v| truncate(&v.to_string(), MAX_RAW_OUTPUT_CHARS)),
        }
    }

    /// Build a parse diagnostic from a decode failure.
    pub fn from_decode(error: &DecodeError) -> Self {
        Self {
            kind: DiagnosticKind::Parse,
            message: error.message().to_string(),
            field: None,
            expected: Some("valid structured output".to_string()),
            received: None,
            suggestion: Some("respond with a single well-formed JSON value and nothing else".to_string()),
            raw_output: Some(truncate(error.raw_text(), MAX_RAW_OUTPUT_CHARS)),
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn received(&self) -> Option<&str> {
        self.received.as_deref()
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Raw payload, at most [`MAX_RAW_OUTPUT_CHARS`] characters.
    pub fn raw_output(&self) -> Option<&str> {
        self.raw_output.as_deref()
    }
}

/// Derive a human-readable fix from the failure shape.
fn suggest(error: &FieldError) -> String {
    let field = error.field().unwrap_or_else(|| "value".to_string());
    match &error.issue {
        Issue::TooSmall { minimum } => {
            format!("increase size of field '{}' to at least {}", field, minimum)
        }
        Issue::TooBig { maximum } => {
            format!("decrease size of field '{}' to at most {}", field, maximum)
        }
        Issue::InvalidType { expected, received } => {
            format!("'{}' should be {}, got {}", field, expected, received)
        }
        Issue::InvalidEnum { options } => {
            format!("'{}' must be one of: {}", field, options.join(", "))
        }
        Issue::MissingField | Issue::Custom => format!("fix '{}': {}", field, error.message),
    }
}

/// Short description of a received value: its type plus a clipped rendering.
fn summarize(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            format!("{} {}", type_name(value), truncate(&value.to_string(), MAX_RECEIVED_CHARS))
        }
        other => truncate(&other.to_string(), MAX_RECEIVED_CHARS),
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with "...".
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_short_unchanged() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_bounds_length() {
        let long = "x".repeat(2000);
        let out = truncate(&long, MAX_RAW_OUTPUT_CHARS);
        assert_eq!(out.chars().count(), MAX_RAW_OUTPUT_CHARS);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte() {
        let long = "é".repeat(600);
        let out = truncate(&long, 500);
        assert_eq!(out.chars().count(), 500);
    }

    #[test]
    fn test_first_error_only() {
        let errors = vec![
            FieldError::new("first", Issue::Custom).at(&["a"]),
            FieldError::new("second", Issue::Custom).at(&["b"]),
        ];
        let diag = Diagnostic::from_validation(&errors, None);
        assert_eq!(diag.message(), "first");
        assert_eq!(diag.field(), Some("a"));
        assert_eq!(diag.kind(), DiagnosticKind::Validation);
    }

    #[test]
    fn test_empty_error_list() {
        let diag = Diagnostic::from_validation(&[], Some(&json!({"x": 1})));
        assert_eq!(diag.kind(), DiagnosticKind::Validation);
        assert!(diag.field().is_none());
        assert_eq!(diag.raw_output(), Some(r#"{"x":1}"#));
    }

    #[test]
    fn test_suggestion_too_small() {
        let err = FieldError::new("too short", Issue::TooSmall { minimum: "3".into() }).at(&["tags"]);
        let diag = Diagnostic::from_field_error(&err, None);
        assert_eq!(diag.suggestion(), Some("increase size of field 'tags' to at least 3"));
        assert_eq!(diag.expected(), Some("at least 3"));
    }

    #[test]
    fn test_suggestion_too_big() {
        let err = FieldError::new("too long", Issue::TooBig { maximum: "5".into() }).at(&["title"]);
        let diag = Diagnostic::from_field_error(&err, None);
        assert!(diag.suggestion().unwrap().starts_with("decrease size of field 'title'"));
    }

    #[test]
    fn test_suggestion_invalid_type() {
        let err = FieldError::new(
            "wrong type",
            Issue::InvalidType {
                expected: "number".into(),
                received: "string".into(),
            },
        )
        .at(&["year"]);
        let diag = Diagnostic::from_field_error(&err, None);
        assert_eq!(diag.suggestion(), Some("'year' should be number, got string"));
        assert_eq!(diag.received(), Some("string"));
    }

    #[test]
    fn test_suggestion_enum() {
        let err = FieldError::new(
            "bad option",
            Issue::InvalidEnum {
                options: vec!["approve".into(), "reject".into()],
            },
        )
        .at(&["decision"]);
        let diag = Diagnostic::from_field_error(&err, None);
        assert_eq!(diag.suggestion(), Some("'decision' must be one of: approve, reject"));
    }

    #[test]
    fn test_suggestion_generic() {
        let err = FieldError::new("must mention Rust", Issue::Custom).at(&["summary"]);
        let diag = Diagnostic::from_field_error(&err, None);
        assert_eq!(diag.suggestion(), Some("fix 'summary': must mention Rust"));
    }

    #[test]
    fn test_received_summarised_from_output() {
        let err = FieldError::new("too short", Issue::TooSmall { minimum: "10".into() }).at(&["name"]);
        let output = json!({"name": "Al"});
        let diag = Diagnostic::from_field_error(&err, Some(&output));
        assert_eq!(diag.received(), Some("\"Al\""));
    }

    #[test]
    fn test_raw_output_truncated_at_construction() {
        let err = FieldError::new("bad", Issue::Custom);
        let output = json!("y".repeat(2000));
        let diag = Diagnostic::from_field_error(&err, Some(&output));
        assert!(diag.raw_output().unwrap().chars().count() <= MAX_RAW_OUTPUT_CHARS);
    }

    #[test]
    fn test_from_decode() {
        let err = DecodeError::new("no JSON value found", "z".repeat(2000));
        let diag = Diagnostic::from_decode(&err);
        assert_eq!(diag.kind(), DiagnosticKind::Parse);
        assert!(diag.raw_output().unwrap().chars().count() <= MAX_RAW_OUTPUT_CHARS);
    }

    #[test]
    fn test_serializes_camel_case() {
        let err = DecodeError::new("oops", "{bad");
        let value = serde_json::to_value(Diagnostic::from_decode(&err)).unwrap();
        assert_eq!(value["kind"], "parse");
        assert_eq!(value["rawOutput"], "{bad");
        assert!(value.get("field").is_none());
    }

    #[test]
    fn test_deserialized_raw_output_is_truncated() {
        let diag: Diagnostic = serde_json::from_value(json!({
            "kind": "parse",
            "message": "m",
            "rawOutput": "x".repeat(2000),
        }))
        .unwrap();
        let raw = diag.raw_output().unwrap();
        assert_eq!(raw.chars().count(), MAX_RAW_OUTPUT_CHARS);
        assert!(raw.ends_with("..."));
    }

    #[test]
    fn test_deserialize_keeps_bounded_fields() {
        let original = Diagnostic::from_decode(&DecodeError::new("oops", "{bad"));
        let back: Diagnostic =
            serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(back, original);
    }
}
