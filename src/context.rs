//! Ambient, call-scoped access to the current [`ExecutionState`].
//!
//! The guard publishes each attempt's state with [`publish`] around the
//! producer future. Code running inside that future (at any depth, across
//! any number of `.await` points) reads it back with [`current`] without the
//! state being threaded through as a parameter.
//!
//! The binding is a tokio task-local scoped to the producer future, not a
//! global. Two guarded calls polled concurrently (on one task via `join!`,
//! or on separate tasks) each see only their own state: the binding is
//! swapped in on every poll of the scoped future and swapped out again
//! before the poll returns.
//!
//! Work moved onto a new task with `tokio::spawn` does not inherit the
//! binding; capture the state explicitly (or re-[`publish`] it) there.

use crate::exec_state::ExecutionState;
use std::future::Future;

tokio::task_local! {
    static CURRENT: ExecutionState;
}

/// Run `body` with `state` bound as the ambient execution state.
///
/// Nested calls shadow the outer state for their duration and restore it
/// afterwards.
pub async fn publish<F: Future>(state: ExecutionState, body: F) -> F::Output {
    CURRENT.scope(state, body).await
}

/// Synchronous counterpart of [`publish`].
pub fn publish_sync<R>(state: ExecutionState, body: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(state, body)
}

/// The innermost published state, or [`ExecutionState::default`] when no
/// guarded attempt is running.
pub fn current() -> ExecutionState {
    CURRENT.try_with(ExecutionState::clone).unwrap_or_default()
}

/// Whether a state is currently published.
pub fn is_active() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outside_scope() {
        assert!(!is_active());
        let s = current();
        assert_eq!(s.attempt_number(), 1);
        assert_eq!(s.max_attempts(), 1);
        assert!(!s.is_retry());
        assert!(s.feedback().is_none());
    }

    #[tokio::test]
    async fn test_publish_binds_across_await() {
        let state = ExecutionState::synthetic(2, 3, Some("retry hint".into()));
        let seen = publish(state, async {
            tokio::task::yield_now().await;
            current()
        })
        .await;
        assert_eq!(seen.attempt_number(), 2);
        assert_eq!(seen.feedback().as_deref(), Some("retry hint"));
        assert!(!is_active());
    }

    #[tokio::test]
    async fn test_nested_publish_shadows_and_restores() {
        let outer = ExecutionState::synthetic(1, 3, None);
        let inner = ExecutionState::synthetic(3, 3, None);
        publish(outer, async move {
            assert_eq!(current().attempt_number(), 1);
            let nested = publish(inner, async { current().attempt_number() }).await;
            assert_eq!(nested, 3);
            assert_eq!(current().attempt_number(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn test_interleaved_scopes_stay_isolated() {
        let a = publish(ExecutionState::synthetic(1, 5, None), async {
            let mut seen = Vec::new();
            for _ in 0..3 {
                seen.push(current().attempt_number());
                tokio::task::yield_now().await;
            }
            seen
        });
        let b = publish(ExecutionState::synthetic(4, 5, None), async {
            let mut seen = Vec::new();
            for _ in 0..3 {
                seen.push(current().attempt_number());
                tokio::task::yield_now().await;
            }
            seen
        });
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a, vec![1, 1, 1]);
        assert_eq!(b, vec![4, 4, 4]);
    }

    #[test]
    fn test_publish_sync() {
        let n = publish_sync(ExecutionState::synthetic(2, 2, None), || {
            current().attempt_number()
        });
        assert_eq!(n, 2);
        assert!(!is_active());
    }
}
