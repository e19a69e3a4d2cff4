//! Error types for the reactive runtime.
//!
//! Everything that can go wrong surfaces through [`ReactiveError`]. Failures
//! inside effect bodies travel back out through the write that triggered
//! them, so `set` and friends return a [`Result`].

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Boxed error returned by fallible effect and memo bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// `reactive()` was given something that is not an object.
    #[error("invalid reactive target: expected an object, got {found}")]
    InvalidTarget { found: &'static str },

    /// A value could not be converted to or from the object model.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An effect body returned an error.
    #[error("effect {subscriber} failed: {source}")]
    Effect {
        subscriber: SubscriberId,
        #[source]
        source: BoxError,
    },

    /// A fallible memo's computation returned an error.
    #[error("memo {subscriber} failed: {source}")]
    Memo {
        subscriber: SubscriberId,
        #[source]
        source: BoxError,
    },

    /// An effect was notified while it was still running.
    #[error("effect {subscriber} was re-triggered by a write during its own run")]
    Cycle { subscriber: SubscriberId },

    /// An effect kept re-triggering itself.
    #[error("effect {subscriber} re-triggered itself more than {limit} times")]
    RerunLimit { subscriber: SubscriberId, limit: usize },

    /// Several effects failed during one notification pass.
    #[error("{} effects failed during notification", .0.len())]
    Multiple(Vec<ReactiveError>),
}

impl ReactiveError {
    /// Collapse the errors gathered during a notification pass.
    pub(crate) fn collect(mut errors: Vec<ReactiveError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ReactiveError::Multiple(errors)),
        }
    }

    /// Whether this error (or any error it groups) is a cycle diagnosis.
    pub fn is_cycle(&self) -> bool {
        match self {
            ReactiveError::Cycle { .. } | ReactiveError::RerunLimit { .. } => true,
            ReactiveError::Multiple(errors) => errors.iter().any(Self::is_cycle),
            ReactiveError::Effect { source, .. } | ReactiveError::Memo { source, .. } => source
                .downcast_ref::<ReactiveError>()
                .is_some_and(Self::is_cycle),
            _ => false,
        }
    }
}
