use crate::decode::DecodeError;
use crate::violation::Violation;
use thiserror::Error;

/// Errors returned by a guarded call.
#[derive(Error, Debug)]
pub enum GuardError {
    /// An input or output contract was violated and the failure policy is
    /// `Raise`.
    #[error(transparent)]
    Violation(Box<Violation>),

    /// The producer's output could not be decoded and parse failures were
    /// not retryable (or only one attempt was allowed). Passed through as
    /// the producer raised it.
    #[error(transparent)]
    Decode(DecodeError),

    /// Any other producer failure. Never retried, never recorded.
    #[error(transparent)]
    Producer(anyhow::Error),

    /// The final value did not deserialize into the requested type.
    #[error("guarded output has the wrong shape: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// The attempt loop exited without an outcome.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl GuardError {
    /// The terminal violation, if this is one.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            GuardError::Violation(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, GuardError::Violation(_))
    }
}

impl From<Violation> for GuardError {
    fn from(violation: Violation) -> Self {
        GuardError::Violation(Box::new(violation))
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
