//! Per-attempt execution state visible to producers.
//!
//! The guard builds a fresh [`ExecutionState`] at the start of every
//! attempt. It is handed to the producer explicitly and published through
//! [`context`](crate::context) for code that has no direct access to it.
//! A state never changes after it is built.

use crate::diagnostic::{truncate, Diagnostic};
use crate::ledger::AttemptRecord;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;

/// Maximum raw-payload excerpt included in feedback text.
const FEEDBACK_EXCERPT_CHARS: usize = 200;

/// Snapshot of where a guarded call stands for the current attempt.
///
/// # Example
///
/// ```
/// use llm_guard::ExecutionState;
///
/// let state = ExecutionState::default();
/// assert_eq!(state.attempt_number(), 1);
/// assert!(!state.is_retry());
/// assert!(state.feedback().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionState {
    attempt_number: u32,
    max_attempts: u32,
    last_diagnostic: Option<Diagnostic>,
    ledger: Arc<[AttemptRecord]>,
    canned_feedback: Option<String>,
}

impl ExecutionState {
    pub(crate) fn new(
        attempt_number: u32,
        max_attempts: u32,
        last_diagnostic: Option<Diagnostic>,
        ledger: Arc<[AttemptRecord]>,
    ) -> Self {
        Self {
            attempt_number,
            max_attempts,
            last_diagnostic,
            ledger,
            canned_feedback: None,
        }
    }

    /// Build a state outside the retry loop, for testing producers in
    /// isolation. `feedback()` returns `feedback` verbatim.
    pub fn synthetic(attempt_number: u32, max_attempts: u32, feedback: Option<String>) -> Self {
        let attempt_number = attempt_number.max(1);
        Self {
            attempt_number,
            max_attempts: max_attempts.max(attempt_number),
            last_diagnostic: None,
            ledger: Arc::from(Vec::new()),
            canned_feedback: feedback,
        }
    }

    /// 1-based number of the current attempt.
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts left after this one.
    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_number)
    }

    pub fn is_retry(&self) -> bool {
        self.attempt_number > 1
    }

    pub fn is_final_attempt(&self) -> bool {
        self.attempt_number == self.max_attempts
    }

    /// Why the previous attempt failed.
    pub fn last_diagnostic(&self) -> Option<&Diagnostic> {
        self.last_diagnostic.as_ref()
    }

    /// Attempts made before this one.
    pub fn ledger_so_far(&self) -> &[AttemptRecord] {
        &self.ledger
    }

    /// Correction text for the next prompt, or `None` on a first attempt.
    ///
    /// Fixed order: kind, message, field, suggestion, raw excerpt. The guard
    /// never injects this into producer input; producers opt in by reading it.
    pub fn feedback(&self) -> Option<String> {
        if let Some(ref canned) = self.canned_feedback {
            return Some(canned.clone());
        }
        let diag = self.last_diagnostic.as_ref()?;

        let mut text = format!("Your previous response failed {} checks.\n", diag.kind());
        let _ = writeln!(text, "Error: {}", diag.message());
        if let Some(field) = diag.field() {
            let _ = writeln!(text, "Field: {}", field);
        }
        if let Some(suggestion) = diag.suggestion() {
            let _ = writeln!(text, "Suggestion: {}", suggestion);
        }
        if let Some(raw) = diag.raw_output() {
            let _ = writeln!(
                text,
                "Your previous output: {}",
                truncate(raw, FEEDBACK_EXCERPT_CHARS)
            );
        }
        Some(text.trim_end().to_string())
    }

    /// JSON form injected into an options object's `retry` field.
    pub fn to_value(&self) -> Value {
        json!({
            "attemptNumber": self.attempt_number,
            "maxAttempts": self.max_attempts,
            "remaining": self.remaining(),
            "isRetry": self.is_retry(),
            "isFinalAttempt": self.is_final_attempt(),
            "lastDiagnostic": self.last_diagnostic,
            "ledgerSoFar": &*self.ledger,
            "feedback": self.feedback(),
        })
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new(1, 1, None, Arc::from(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeError;
    use crate::schema::{FieldError, Issue};

    #[test]
    fn test_default_state() {
        let s = ExecutionState::default();
        assert_eq!(s.attempt_number(), 1);
        assert_eq!(s.max_attempts(), 1);
        assert_eq!(s.remaining(), 0);
        assert!(s.is_final_attempt());
        assert!(s.last_diagnostic().is_none());
        assert!(s.ledger_so_far().is_empty());
    }

    #[test]
    fn test_retry_flags() {
        let s = ExecutionState::new(2, 3, None, Arc::from(Vec::new()));
        assert!(s.is_retry());
        assert!(!s.is_final_attempt());
        assert_eq!(s.remaining(), 1);
    }

    #[test]
    fn test_feedback_fixed_order() {
        let err = FieldError::new(
            "expected number",
            Issue::InvalidType {
                expected: "number".into(),
                received: "string".into(),
            },
        )
        .at(&["year"]);
        let output = serde_json::json!({"year": "1999"});
        let diag = Diagnostic::from_field_error(&err, Some(&output));
        let s = ExecutionState::new(2, 3, Some(diag), Arc::from(Vec::new()));

        let text = s.feedback().unwrap();
        let kind = text.find("validation").unwrap();
        let msg = text.find("Error: expected number").unwrap();
        let field = text.find("Field: year").unwrap();
        let sugg = text.find("Suggestion: 'year' should be number").unwrap();
        let raw = text.find("Your previous output:").unwrap();
        assert!(kind < msg && msg < field && field < sugg && sugg < raw);
    }

    #[test]
    fn test_feedback_excerpt_is_bounded() {
        let diag = Diagnostic::from_decode(&DecodeError::new("bad", "q".repeat(2000)));
        let s = ExecutionState::new(2, 2, Some(diag), Arc::from(Vec::new()));
        let text = s.feedback().unwrap();
        let excerpt = text.lines().last().unwrap();
        let body = excerpt.trim_start_matches("Your previous output: ");
        assert!(body.chars().count() <= FEEDBACK_EXCERPT_CHARS);
    }

    #[test]
    fn test_synthetic_feedback() {
        let s = ExecutionState::synthetic(3, 3, Some("fix the year".into()));
        assert!(s.is_retry());
        assert!(s.is_final_attempt());
        assert_eq!(s.feedback().as_deref(), Some("fix the year"));
    }

    #[test]
    fn test_to_value() {
        let s = ExecutionState::synthetic(2, 4, None);
        let v = s.to_value();
        assert_eq!(v["attemptNumber"], 2);
        assert_eq!(v["remaining"], 2);
        assert_eq!(v["isRetry"], true);
        assert_eq!(v["ledgerSoFar"], json!([]));
        assert!(v["feedback"].is_null());
    }
}
