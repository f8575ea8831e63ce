#![forbid(unsafe_code)]

//! Error taxonomy for command execution.
//!
//! Everything an action can do wrong folds into [`CommandError`]:
//!
//! - the action returned the error variant of its `Result` — carried
//!   verbatim as [`CommandError::Failed`];
//! - the action (or the cancel callback) panicked — captured as
//!   [`CommandError::Panicked`], with a best-effort backtrace recorded in
//!   the history entry's metadata rather than in the error itself;
//! - the execution raced a timeout and lost — [`CommandError::TimedOut`].
//!
//! `TimedOut` is folded internally but never becomes the externally
//! observed state: the timeout fires the cancellation path first, and the
//! engine's running-state guard discards the synthetic failure. It remains
//! public so dispatch code can still name it exhaustively.
//!
//! Errors are never returned to the caller of `execute`; they surface
//! through the command's state and subscriptions.

use std::time::Duration;

use thiserror::Error;

/// The failure payload carried by `CommandState::Failure`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError<E: std::fmt::Debug> {
    /// The action completed and reported an error of its own type.
    #[error("action reported failure")]
    Failed(E),

    /// The action or the cancel callback panicked mid-flight.
    #[error("unexpected panic during execution: {message}")]
    Panicked {
        /// Stringified panic payload (`&str`/`String` payloads verbatim,
        /// otherwise a placeholder).
        message: String,
    },

    /// Synthetic failure produced when the timeout race is lost.
    #[error("action timed out after {0:?}")]
    TimedOut(Duration),
}

impl<E: std::fmt::Debug> CommandError<E> {
    /// The action-reported error, if that is what this is.
    #[must_use]
    pub fn action_error(&self) -> Option<&E> {
        match self {
            CommandError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Render a panic payload into a human-readable message.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        CommandError::Panicked { message }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
