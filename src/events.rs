//! Event system for guard lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe guarded calls.
//! The guard emits events when a call starts, when each attempt starts or
//! fails, when a failure policy fires, and when the call ends. Implement
//! [`EventHandler`] to receive them for metrics, progress tracking, or
//! audit logs.

use crate::diagnostic::DiagnosticKind;
use std::sync::Arc;

/// Events emitted during a guarded call.
#[derive(Debug, Clone)]
pub enum GuardEvent {
    /// A guarded call has started.
    CallStart {
        /// Node name of the guard.
        node: String,
    },
    /// An attempt is about to invoke the producer.
    AttemptStart {
        /// Node name of the guard.
        node: String,
        /// 1-based attempt number.
        attempt: u32,
        /// Attempt budget for the call.
        max_attempts: u32,
    },
    /// An attempt failed with a classified (validation or parse) failure.
    AttemptFailed {
        /// Node name of the guard.
        node: String,
        /// 1-based number of the failed attempt.
        attempt: u32,
        /// Whether the output failed its schema or could not be decoded.
        kind: DiagnosticKind,
        /// The diagnostic message.
        message: String,
    },
    /// A terminal violation was handed to the failure policy.
    PolicyApplied {
        /// Node name of the guard.
        node: String,
        /// Policy name (`"raise"`, `"return_null"`, `"return_input"`, `"custom"`).
        policy: &'static str,
    },
    /// The guarded call has finished.
    CallEnd {
        /// Node name of the guard.
        node: String,
        /// Producer invocations made.
        attempts: u32,
        /// Whether a schema-valid value was produced.
        ok: bool,
    },
}

/// Handler for guard lifecycle events.
///
/// This is entirely optional -- guards work without an event handler.
///
/// # Example
///
/// ```
/// use llm_guard::events::{EventHandler, GuardEvent};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: GuardEvent) {
///         match event {
///             GuardEvent::AttemptFailed { node, attempt, message, .. } => {
///                 println!("[{}] attempt {} failed: {}", node, attempt, message)
///             }
///             GuardEvent::CallEnd { node, ok, .. } => println!("[end] {} ok={}", node, ok),
///             _ => {} // CallStart, AttemptStart, PolicyApplied
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when a guard emits an event.
    fn on_event(&self, event: GuardEvent);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: GuardEvent) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_guard::events::{FnEventHandler, GuardEvent};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: GuardEvent| {
///     if let GuardEvent::AttemptStart { attempt, .. } = event {
///         println!("attempt {}", attempt);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(GuardEvent) + Send + Sync>(pub F);

impl<F: Fn(GuardEvent) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: GuardEvent) {
        (self.0)(event);
    }
}
