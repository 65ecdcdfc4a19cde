//! Example: a flaky "model" that gets corrected by retry feedback.
//!
//! Run with: `cargo run --example retry_feedback`

use llm_guard::decode::decode_json;
use llm_guard::schema::TypedSchema;
use llm_guard::{context, ExecutionState, Guard, GuardConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Serialize, Deserialize)]
struct MovieReview {
    title: String,
    rating: f64,
}

/// Stand-in for an LLM call: malformed first, wrong shape second, valid once
/// the prompt carries feedback about the missing rating.
async fn fake_model(prompt: String, attempt: u32) -> String {
    match attempt {
        1 => "Sure! Here's the review: {title: Inception".to_string(),
        _ if prompt.contains("rating") => r#"{"title": "Inception", "rating": 9.2}"#.to_string(),
        _ => r#"{"title": "Inception"}"#.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("llm_guard=debug"))
        .init();

    let guard = Guard::from_fn(
        GuardConfig::new("review")
            .with_output_schema(TypedSchema::<MovieReview>::new())
            .with_max_attempts(4),
        |input: Value, state: ExecutionState| async move {
            let mut prompt = format!("Review the movie {} as JSON.", input);
            if let Some(feedback) = context::current().feedback() {
                println!("--- feedback for attempt {} ---\n{}\n", state.attempt_number(), feedback);
                prompt.push_str("\n\n");
                prompt.push_str(&feedback);
            }
            let text = fake_model(prompt, state.attempt_number()).await;
            anyhow::Ok(decode_json(&text)?)
        },
    );

    let review: MovieReview = guard.call_as(json!("Inception")).await?;
    println!("Movie: {} ({}/10)", review.title, review.rating);
    Ok(())
}
