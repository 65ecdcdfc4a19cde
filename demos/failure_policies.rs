//! Example: what a guarded call returns once retries are exhausted.
//!
//! Run with: `cargo run --example failure_policies`

use llm_guard::schema::RequiredKeys;
use llm_guard::{ExecutionState, FailurePolicy, Guard, GuardConfig, GuardError};
use serde_json::{json, Value};

fn config(policy: FailurePolicy) -> GuardConfig {
    GuardConfig::new("classify")
        .with_output_schema(RequiredKeys::new(&["label"]))
        .with_max_attempts(2)
        .on_failure(policy)
}

async fn never_labels(_input: Value, _state: ExecutionState) -> anyhow::Result<Value> {
    Ok(json!({"labels": ["oops"]}))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = json!({"text": "great movie"});

    match Guard::new(config(FailurePolicy::Raise), never_labels).call(input.clone()).await {
        Err(GuardError::Violation(v)) => {
            println!("raise: {}", v);
            println!("{}", serde_json::to_string_pretty(&v.to_value())?);
        }
        other => println!("raise: unexpected {:?}", other),
    }

    let null = Guard::new(config(FailurePolicy::ReturnNull), never_labels)
        .call(input.clone())
        .await?;
    println!("return_null: {}", null);

    let echoed = Guard::new(config(FailurePolicy::ReturnInput), never_labels)
        .call(input.clone())
        .await?;
    println!("return_input: {}", echoed);

    let custom = Guard::new(
        config(FailurePolicy::custom(|v| {
            json!({"label": "unknown", "attempts": v.total_attempts()})
        })),
        never_labels,
    )
    .call(input)
    .await?;
    println!("custom: {}", custom);

    Ok(())
}
