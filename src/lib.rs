//! # LLM Guard
//!
//! Schema-guarded calls for unreliable producers (typically LLM calls).
//!
//! A [`Guard`] wraps a producer function with an input contract, an output
//! contract, and a bounded retry loop. When an attempt returns output that
//! fails its schema, or text that cannot be decoded, the guard records why,
//! publishes that diagnostic to the next attempt, and calls the producer
//! again. The result is either a schema-valid value or a [`Violation`]
//! carrying the full attempt ledger.
//!
//! ## Core Concepts
//!
//! - **[`Guard`]** — the retry/validation state machine around a producer.
//! - **[`Producer`]** — the wrapped function. Any
//!   `Fn(Value, ExecutionState) -> impl Future<Output = anyhow::Result<Value>>`.
//! - **[`ExecutionState`]** — per-attempt state: attempt number, retry
//!   flags, last diagnostic, ledger so far, and [`feedback()`](ExecutionState::feedback)
//!   text for the next prompt.
//! - **[`context`]** — ambient access to the current state from anywhere
//!   inside a producer, isolated per call.
//! - **[`Violation`]** — terminal contract failure with the attempt ledger,
//!   serializable to plain JSON.
//! - **[`FailurePolicy`]** — raise, return null, return the input, or a
//!   custom fallback.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_guard::{decode::decode_json, context, Guard, GuardConfig, ExecutionState};
//! use llm_guard::schema::RequiredKeys;
//! use serde_json::{json, Value};
//!
//! async fn ask_model(prompt: String) -> anyhow::Result<String> {
//!     // call your LLM client here
//!     Ok(prompt)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guard = Guard::from_fn(
//!         GuardConfig::new("movie")
//!             .with_output_schema(RequiredKeys::new(&["title", "year"]))
//!             .with_max_attempts(3),
//!         |input: Value, _state: ExecutionState| async move {
//!             let mut prompt = format!("Describe the movie {} as JSON.", input);
//!             if let Some(feedback) = context::current().feedback() {
//!                 prompt.push_str("\n\n");
//!                 prompt.push_str(&feedback);
//!             }
//!             let text = ask_model(prompt).await?;
//!             anyhow::Ok(decode_json(&text)?)
//!         },
//!     );
//!
//!     let movie = guard.call(json!("Heat")).await?;
//!     println!("{}", movie["title"]);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod decode;
pub mod diagnostic;
pub mod error;
pub mod events;
pub mod exec_state;
pub mod guard;
pub mod ledger;
pub mod producer;
pub mod schema;
pub mod testing;
pub mod violation;

pub use config::{FailurePolicy, GuardConfig, RetrySettings};
pub use decode::DecodeError;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{GuardError, Result};
pub use exec_state::ExecutionState;
pub use guard::Guard;
pub use ledger::{AttemptRecord, Ledger};
pub use producer::Producer;
pub use schema::{FieldError, Issue, Schema};
pub use violation::{ContractType, Violation, ViolationReport};
