//! Guard configuration.
//!
//! [`GuardConfig`] is built once at the call site with `with_*` builder
//! methods and is immutable for the guard's lifetime. The serialisable part
//! of it (attempt budget and retryable kinds) is [`RetrySettings`], so retry
//! policy can come from a JSON or YAML config file.
//!
//! # Example
//!
//! ```
//! use llm_guard::config::{FailurePolicy, GuardConfig};
//! use llm_guard::schema::RequiredKeys;
//! use llm_guard::DiagnosticKind;
//!
//! let config = GuardConfig::new("summarize")
//!     .with_output_schema(RequiredKeys::new(&["summary"]))
//!     .with_max_attempts(3)
//!     .retry_on(&[DiagnosticKind::Validation])
//!     .on_failure(FailurePolicy::ReturnNull);
//! assert_eq!(config.max_attempts(), 3);
//! ```

use crate::diagnostic::DiagnosticKind;
use crate::events::EventHandler;
use crate::schema::Schema;
use crate::violation::Violation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Type alias for the custom failure handler used in [`FailurePolicy::Custom`].
pub type FailureHandlerFn = Arc<dyn Fn(&Violation) -> Value + Send + Sync>;

/// What a guarded call does with a terminal [`Violation`].
#[derive(Clone, Default)]
pub enum FailurePolicy {
    /// Return the violation as an error. The default.
    #[default]
    Raise,
    /// Return `Value::Null`.
    ReturnNull,
    /// Return the original call input unchanged.
    ReturnInput,
    /// Return whatever the handler builds from the violation.
    Custom(FailureHandlerFn),
}

impl FailurePolicy {
    /// Wrap a closure as a [`FailurePolicy::Custom`].
    pub fn custom(f: impl Fn(&Violation) -> Value + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Stable name, used in events and logs.
    pub fn name(&self) -> &'static str {
        match self {
            FailurePolicy::Raise => "raise",
            FailurePolicy::ReturnNull => "return_null",
            FailurePolicy::ReturnInput => "return_input",
            FailurePolicy::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Raise => write!(f, "Raise"),
            FailurePolicy::ReturnNull => write!(f, "ReturnNull"),
            FailurePolicy::ReturnInput => write!(f, "ReturnInput"),
            FailurePolicy::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Retry budget and retryable failure kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first. Values below 1 are raised to 1.
    pub max_attempts: u32,
    /// Failure kinds that may trigger another attempt.
    pub retry_on: Vec<DiagnosticKind>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_on: vec![DiagnosticKind::Validation, DiagnosticKind::Parse],
        }
    }
}

/// Configuration for a [`Guard`](crate::guard::Guard).
#[derive(Clone)]
pub struct GuardConfig {
    node_name: String,
    input_schema: Option<Arc<dyn Schema>>,
    output_schema: Option<Arc<dyn Schema>>,
    settings: RetrySettings,
    failure_policy: FailurePolicy,
    input_key: Option<String>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl GuardConfig {
    /// A config with no schemas, a single attempt, both kinds retryable and
    /// the `Raise` policy.
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            input_schema: None,
            output_schema: None,
            settings: RetrySettings::default(),
            failure_policy: FailurePolicy::default(),
            input_key: None,
            event_handler: None,
        }
    }

    /// Validate the call input once, before any attempt.
    pub fn with_input_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.input_schema = Some(Arc::new(schema));
        self
    }

    /// Validate every producer result.
    pub fn with_output_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.output_schema = Some(Arc::new(schema));
        self
    }

    /// Total attempts including the first. Clamped to at least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.settings.max_attempts = max_attempts.max(1);
        self
    }

    /// Restrict which failure kinds are retried.
    pub fn retry_on(mut self, kinds: &[DiagnosticKind]) -> Self {
        self.settings.retry_on = kinds.to_vec();
        self
    }

    /// Apply settings loaded from configuration.
    pub fn with_settings(mut self, settings: RetrySettings) -> Self {
        self.settings = RetrySettings {
            max_attempts: settings.max_attempts.max(1),
            retry_on: settings.retry_on,
        };
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validate `input[key]` instead of the whole input object.
    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = Some(key.into());
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn input_schema(&self) -> Option<&dyn Schema> {
        self.input_schema.as_deref()
    }

    pub fn output_schema(&self) -> Option<&dyn Schema> {
        self.output_schema.as_deref()
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts.max(1)
    }

    pub fn is_retryable(&self, kind: DiagnosticKind) -> bool {
        self.settings.retry_on.contains(&kind)
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    pub fn failure_policy(&self) -> &FailurePolicy {
        &self.failure_policy
    }

    pub fn input_key(&self) -> Option<&str> {
        self.input_key.as_deref()
    }

    pub(crate) fn event_handler(&self) -> &Option<Arc<dyn EventHandler>> {
        &self.event_handler
    }
}

impl std::fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardConfig")
            .field("node_name", &self.node_name)
            .field("has_input_schema", &self.input_schema.is_some())
            .field("has_output_schema", &self.output_schema.is_some())
            .field("settings", &self.settings)
            .field("failure_policy", &self.failure_policy)
            .field("input_key", &self.input_key)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::new("node");
        assert_eq!(config.max_attempts(), 1);
        assert!(config.is_retryable(DiagnosticKind::Validation));
        assert!(config.is_retryable(DiagnosticKind::Parse));
        assert!(matches!(config.failure_policy(), FailurePolicy::Raise));
        assert!(config.input_schema().is_none());
        assert!(config.input_key().is_none());
    }

    #[test]
    fn test_max_attempts_clamped() {
        assert_eq!(GuardConfig::new("n").with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_retry_on_restricts_kinds() {
        let config = GuardConfig::new("n").retry_on(&[DiagnosticKind::Validation]);
        assert!(!config.is_retryable(DiagnosticKind::Parse));
    }

    #[test]
    fn test_settings_from_json() {
        let settings: RetrySettings =
            serde_json::from_value(json!({"max_attempts": 4, "retry_on": ["parse"]})).unwrap();
        let config = GuardConfig::new("n").with_settings(settings);
        assert_eq!(config.max_attempts(), 4);
        assert!(config.is_retryable(DiagnosticKind::Parse));
        assert!(!config.is_retryable(DiagnosticKind::Validation));
    }

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: RetrySettings = serde_json::from_value(json!({"max_attempts": 0})).unwrap();
        assert_eq!(settings.retry_on.len(), 2);
        let config = GuardConfig::new("n").with_settings(settings);
        assert_eq!(config.max_attempts(), 1);
    }

    #[test]
    fn test_policy_debug_and_name() {
        let policy = FailurePolicy::custom(|v| json!({"failed": v.node_name()}));
        assert_eq!(format!("{:?}", policy), "Custom(...)");
        assert_eq!(policy.name(), "custom");
        assert_eq!(FailurePolicy::ReturnInput.name(), "return_input");
    }
}
