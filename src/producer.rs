//! The wrapped, unreliable function.
//!
//! A [`Producer`] takes the call input plus the current
//! [`ExecutionState`] and returns a candidate output. Failures are
//! classified by type: a [`DecodeError`](crate::decode::DecodeError)
//! (usually raised with `?` from [`decode_json`](crate::decode::decode_json))
//! is a parse failure the guard may retry; any other error is the
//! producer's own defect and propagates unchanged.

use crate::exec_state::ExecutionState;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Generates a candidate output for a guarded call.
///
/// Implemented for every `Fn(Value, ExecutionState) -> impl Future<Output = anyhow::Result<Value>>`,
/// so closures work directly. The state argument mirrors what
/// [`context::current`](crate::context::current) returns during the call.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, input: Value, state: ExecutionState) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> Producer for F
where
    F: Fn(Value, ExecutionState) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn produce(&self, input: Value, state: ExecutionState) -> anyhow::Result<Value> {
        (self)(input, state).await
    }
}

/// Options-object injection: if `input` is an object carrying a present but
/// unset (`null`) `retry` field, fill it with the state's JSON form.
pub(crate) fn inject_state(input: &Value, state: &ExecutionState) -> Value {
    match input {
        Value::Object(map) if matches!(map.get("retry"), Some(Value::Null)) => {
            let mut map = map.clone();
            map.insert("retry".to_string(), state.to_value());
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inject_fills_unset_retry_field() {
        let state = ExecutionState::synthetic(2, 3, None);
        let out = inject_state(&json!({"text": "hi", "retry": null}), &state);
        assert_eq!(out["retry"]["attemptNumber"], 2);
        assert_eq!(out["text"], "hi");
    }

    #[test]
    fn test_inject_leaves_other_inputs_alone() {
        let state = ExecutionState::synthetic(2, 3, None);
        let set = json!({"retry": {"custom": true}});
        assert_eq!(inject_state(&set, &state), set);
        let absent = json!({"text": "hi"});
        assert_eq!(inject_state(&absent, &state), absent);
        assert_eq!(inject_state(&json!("plain"), &state), json!("plain"));
    }

    #[tokio::test]
    async fn test_closure_is_a_producer() {
        let producer = |input: Value, state: ExecutionState| async move {
            anyhow::Ok(json!({"echo": input, "attempt": state.attempt_number()}))
        };
        let out = producer
            .produce(json!("x"), ExecutionState::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"echo": "x", "attempt": 1}));
    }
}
