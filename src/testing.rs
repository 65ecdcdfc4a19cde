//! Test support for producers.
//!
//! Run producer code under a synthetic [`ExecutionState`] without going
//! through a [`Guard`](crate::Guard), to check how it reacts to retries and
//! feedback.
//!
//! # Example
//!
//! ```
//! use llm_guard::{context, testing};
//!
//! # tokio_test::block_on(async {
//! let prompt = testing::with_state(2, 3, Some("add a 'year' field"), async {
//!     let state = context::current();
//!     match state.feedback() {
//!         Some(fb) => format!("Describe the film.\n\n{}", fb),
//!         None => "Describe the film.".to_string(),
//!     }
//! })
//! .await;
//! assert!(prompt.ends_with("add a 'year' field"));
//! # });
//! ```

use crate::context;
use crate::exec_state::ExecutionState;
use std::future::Future;

/// Run `body` with a synthetic state for `attempt` of `max_attempts`.
/// `feedback()` inside returns `feedback` verbatim.
pub async fn with_state<F: Future>(
    attempt: u32,
    max_attempts: u32,
    feedback: Option<&str>,
    body: F,
) -> F::Output {
    let state = ExecutionState::synthetic(attempt, max_attempts, feedback.map(str::to_string));
    context::publish(state, body).await
}

/// Synchronous counterpart of [`with_state`].
pub fn with_state_sync<R>(
    attempt: u32,
    max_attempts: u32,
    feedback: Option<&str>,
    body: impl FnOnce() -> R,
) -> R {
    let state = ExecutionState::synthetic(attempt, max_attempts, feedback.map(str::to_string));
    context::publish_sync(state, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_state_publishes_synthetic_state() {
        let (attempt, retry, remaining, feedback) = with_state(2, 4, Some("try again"), async {
            let s = context::current();
            (s.attempt_number(), s.is_retry(), s.remaining(), s.feedback())
        })
        .await;
        assert_eq!(attempt, 2);
        assert!(retry);
        assert_eq!(remaining, 2);
        assert_eq!(feedback.as_deref(), Some("try again"));
    }

    #[test]
    fn test_with_state_sync_first_attempt() {
        let (retry, feedback) = with_state_sync(1, 3, None, || {
            let s = context::current();
            (s.is_retry(), s.feedback())
        });
        assert!(!retry);
        assert!(feedback.is_none());
    }

    #[test]
    fn test_attempt_zero_is_raised_to_one() {
        let attempt = with_state_sync(0, 0, None, || context::current().attempt_number());
        assert_eq!(attempt, 1);
    }
}
