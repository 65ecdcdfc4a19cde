//! The guard: input/output contracts and bounded retry around a producer.
//!
//! [`Guard`] validates the call input once, then drives the attempt loop:
//!
//! ```text
//! InputCheck ──fail──► Violation(Input) ──► failure policy
//!     │
//!     ▼
//! Attempting(n) ──valid──► Success
//!     │
//!     ├─ validation / parse failure, n < max, kind retryable ──► Attempting(n+1)
//!     ├─ validation failure, exhausted or not retryable ──► Violation(Output) ──► policy
//!     ├─ parse failure, not retryable or max == 1 ──► DecodeError (raw)
//!     ├─ parse failure, exhausted ──► Violation(Output) ──► policy
//!     └─ any other producer error ──► propagated unchanged
//! ```
//!
//! Each attempt gets a fresh [`ExecutionState`], passed to the producer and
//! published via [`context::publish`] for the duration of that one
//! invocation. Attempts within a call are strictly sequential; independent
//! calls share nothing but the (immutable) config.

use crate::{
    config::{FailurePolicy, GuardConfig},
    context,
    decode::DecodeError,
    diagnostic::Diagnostic,
    error::{GuardError, Result},
    events::{emit, GuardEvent},
    exec_state::ExecutionState,
    ledger::Ledger,
    producer::{inject_state, Producer},
    violation::Violation,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, error, warn};

/// A producer wrapped with contracts and retry policy.
///
/// # Example
///
/// ```
/// use llm_guard::{decode::decode_json, Guard, GuardConfig, ExecutionState};
/// use llm_guard::schema::RequiredKeys;
/// use serde_json::{json, Value};
///
/// # tokio_test::block_on(async {
/// let guard = Guard::from_fn(
///     GuardConfig::new("title")
///         .with_output_schema(RequiredKeys::new(&["title"]))
///         .with_max_attempts(2),
///     |_input: Value, state: ExecutionState| async move {
///         // A real producer would append `state.feedback()` to its prompt.
///         let text = if state.is_retry() { r#"{"title": "Heat"}"# } else { "{}" };
///         anyhow::Ok(decode_json(text)?)
///     },
/// );
///
/// let out = guard.call(json!("a heist film")).await.unwrap();
/// assert_eq!(out["title"], "Heat");
/// # });
/// ```
pub struct Guard<P> {
    config: GuardConfig,
    producer: P,
}

/// What one attempt produced, once classified.
enum AttemptOutcome {
    Valid(Value),
    Invalid {
        diagnostic: Diagnostic,
        path: Vec<String>,
        output: Option<Value>,
        decode: Option<DecodeError>,
    },
}

impl<P: Producer> Guard<P> {
    pub fn new(config: GuardConfig, producer: P) -> Self {
        Self { config, producer }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run a guarded call.
    ///
    /// Returns the schema-valid output, the failure policy's fallback value,
    /// or an error: a [`GuardError::Violation`] under the `Raise` policy, a
    /// raw [`GuardError::Decode`] when parse failures are not retried, or
    /// [`GuardError::Producer`] for any unrelated producer failure.
    pub async fn call(&self, input: Value) -> Result<Value> {
        let node = self.config.node_name();
        let events = self.config.event_handler();
        emit(events, GuardEvent::CallStart { node: node.to_string() });

        if let Some(violation) = self.check_input(&input) {
            warn!(
                node,
                field = violation.field_path(),
                message = violation.message(),
                "input contract violated"
            );
            emit(
                events,
                GuardEvent::CallEnd {
                    node: node.to_string(),
                    attempts: 0,
                    ok: false,
                },
            );
            return self.apply_policy(violation, input);
        }

        let max_attempts = self.config.max_attempts();
        let mut ledger = Ledger::new();

        for attempt in 1..=max_attempts {
            let state = ExecutionState::new(
                attempt,
                max_attempts,
                ledger.last_diagnostic().cloned(),
                ledger.snapshot(),
            );
            debug!(node, attempt, max_attempts, "starting attempt");
            emit(
                events,
                GuardEvent::AttemptStart {
                    node: node.to_string(),
                    attempt,
                    max_attempts,
                },
            );

            let started_at = Utc::now();
            let clock = Instant::now();
            let args = inject_state(&input, &state);
            let result = context::publish(state.clone(), self.producer.produce(args, state)).await;
            let elapsed = clock.elapsed();

            let outcome = match result {
                Ok(value) => self.check_output(value),
                Err(err) => match err.downcast::<DecodeError>() {
                    Ok(decode) => AttemptOutcome::Invalid {
                        diagnostic: Diagnostic::from_decode(&decode),
                        path: Vec::new(),
                        output: None,
                        decode: Some(decode),
                    },
                    Err(other) => {
                        warn!(node, attempt, error = %other, "producer failed");
                        self.end(attempt, false);
                        return Err(GuardError::Producer(other));
                    }
                },
            };

            let (diagnostic, path, output, decode) = match outcome {
                AttemptOutcome::Valid(value) => {
                    ledger.record(started_at, elapsed, None);
                    debug!(node, attempt, "attempt succeeded");
                    self.end(attempt, true);
                    return Ok(value);
                }
                AttemptOutcome::Invalid {
                    diagnostic,
                    path,
                    output,
                    decode,
                } => (diagnostic, path, output, decode),
            };

            let kind = diagnostic.kind();
            ledger.record(started_at, elapsed, Some(diagnostic.clone()));
            warn!(
                node,
                attempt,
                max_attempts,
                kind = %kind,
                field = diagnostic.field(),
                message = diagnostic.message(),
                "attempt failed"
            );
            emit(
                events,
                GuardEvent::AttemptFailed {
                    node: node.to_string(),
                    attempt,
                    kind,
                    message: diagnostic.message().to_string(),
                },
            );

            let retryable = self.config.is_retryable(kind);
            if attempt < max_attempts && retryable {
                continue;
            }

            self.end(attempt, false);

            if let Some(decode) = decode {
                if max_attempts == 1 || !retryable {
                    return Err(GuardError::Decode(decode));
                }
            }

            let elapsed_ms = ledger.total_duration_ms();
            let violation = Violation::output(
                node,
                &diagnostic,
                &path,
                output.as_ref(),
                ledger.into_records(),
            );
            warn!(
                node,
                attempts = violation.total_attempts(),
                elapsed_ms,
                field = violation.field_path(),
                "output contract violated"
            );
            return self.apply_policy(violation, input);
        }

        error!(node, max_attempts, "attempt loop exited without an outcome");
        Err(GuardError::Internal(format!(
            "guard '{}' exhausted {} attempt(s) without an outcome",
            node, max_attempts
        )))
    }

    /// Run a guarded call and deserialize the result into `T`.
    ///
    /// A fallback from `ReturnNull` deserializes only if `T` accepts `null`
    /// (e.g. `Option<_>`).
    pub async fn call_as<T: DeserializeOwned>(&self, input: Value) -> Result<T> {
        let value = self.call(input).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Validate the (optionally extracted) input. Returns the violation on failure.
    fn check_input(&self, input: &Value) -> Option<Violation> {
        let schema = self.config.input_schema()?;
        let extracted = match self.config.input_key() {
            Some(key) => input.get(key).unwrap_or(&Value::Null),
            None => input,
        };
        let errors = schema.validate(extracted).err()?;
        let first = errors.first().cloned().unwrap_or_else(|| {
            crate::schema::FieldError::new(
                "input failed schema validation",
                crate::schema::Issue::Custom,
            )
        });
        Some(Violation::input(self.config.node_name(), &first, extracted))
    }

    fn check_output(&self, value: Value) -> AttemptOutcome {
        let Some(schema) = self.config.output_schema() else {
            return AttemptOutcome::Valid(value);
        };
        match schema.validate(&value) {
            Ok(accepted) => AttemptOutcome::Valid(accepted),
            Err(errors) => AttemptOutcome::Invalid {
                diagnostic: Diagnostic::from_validation(&errors, Some(&value)),
                path: errors.first().map(|e| e.path.clone()).unwrap_or_default(),
                output: Some(value),
                decode: None,
            },
        }
    }

    fn apply_policy(&self, violation: Violation, input: Value) -> Result<Value> {
        let policy = self.config.failure_policy();
        emit(
            self.config.event_handler(),
            GuardEvent::PolicyApplied {
                node: self.config.node_name().to_string(),
                policy: policy.name(),
            },
        );
        match policy {
            FailurePolicy::Raise => Err(violation.into()),
            FailurePolicy::ReturnNull => Ok(Value::Null),
            FailurePolicy::ReturnInput => Ok(input),
            FailurePolicy::Custom(handler) => Ok(handler(&violation)),
        }
    }

    fn end(&self, attempts: u32, ok: bool) {
        emit(
            self.config.event_handler(),
            GuardEvent::CallEnd {
                node: self.config.node_name().to_string(),
                attempts,
                ok,
            },
        );
    }
}

impl<F, Fut> Guard<F>
where
    F: Fn(Value, ExecutionState) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    /// Wrap a closure producer. Same as [`Guard::new`], but lets the
    /// compiler infer the closure's argument types.
    pub fn from_fn(config: GuardConfig, producer: F) -> Self {
        Self::new(config, producer)
    }
}

impl<P> std::fmt::Debug for Guard<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").field("config", &self.config).finish()
    }
}
