#![forbid(unsafe_code)]

//! Command lifecycle states and variant dispatch.
//!
//! [`CommandState`] is the closed set of lifecycle phases a command moves
//! through. Exactly one variant is current per command at any time.
//!
//! # Tag equality
//!
//! Transition suppression inside the engine compares states by
//! [`StateTag`] **only**, never by payload. Two consecutive `Failure`
//! states carrying different errors count as the same transition. This is
//! a deliberate, load-bearing property of the notification protocol; see
//! `Command::set_state`.

use crate::error::CommandError;

/// Fieldless discriminant for [`CommandState`].
///
/// This is the unit of equality for transition suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateTag {
    Idle,
    Running,
    Success,
    Failure,
    Cancelled,
}

impl std::fmt::Display for StateTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StateTag::Idle => "idle",
            StateTag::Running => "running",
            StateTag::Success => "success",
            StateTag::Failure => "failure",
            StateTag::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a command.
///
/// - `Idle`: ready to execute; initial state and post-reset state.
/// - `Running`: action in flight; at most one per command at a time.
/// - `Success`: action completed with a value.
/// - `Failure`: action reported an error, panicked, or the cancel callback
///   panicked.
/// - `Cancelled`: execution was cancelled before completion (including the
///   timeout path).
#[derive(Debug, Clone, PartialEq)]
pub enum CommandState<T, E: std::fmt::Debug> {
    Idle,
    Running,
    Success(T),
    Failure(CommandError<E>),
    Cancelled,
}

impl<T, E: std::fmt::Debug> CommandState<T, E> {
    /// The fieldless discriminant of this state.
    #[must_use]
    pub fn tag(&self) -> StateTag {
        match self {
            CommandState::Idle => StateTag::Idle,
            CommandState::Running => StateTag::Running,
            CommandState::Success(_) => StateTag::Success,
            CommandState::Failure(_) => StateTag::Failure,
            CommandState::Cancelled => StateTag::Cancelled,
        }
    }

    /// Whether `self` and `other` carry the same tag, payloads ignored.
    #[must_use]
    pub fn same_tag(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, CommandState::Idle)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, CommandState::Running)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, CommandState::Success(_))
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, CommandState::Failure(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandState::Cancelled)
    }

    /// The success payload, if this is `Success`.
    #[must_use]
    pub fn success(&self) -> Option<&T> {
        match self {
            CommandState::Success(v) => Some(v),
            _ => None,
        }
    }

    /// The failure payload, if this is `Failure`.
    #[must_use]
    pub fn failure(&self) -> Option<&CommandError<E>> {
        match self {
            CommandState::Failure(e) => Some(e),
            _ => None,
        }
    }

    /// Begin a variant dispatch over this state.
    ///
    /// Arms run eagerly against the borrowed state; the first matching arm
    /// produces the result. Finish with [`StateMatch::or_else`] for a
    /// required result or [`StateMatch::finish`] for an optional one.
    ///
    /// ```
    /// use observable_command::CommandState;
    ///
    /// let state: CommandState<u32, String> = CommandState::Success(7);
    /// let label = state
    ///     .when()
    ///     .on_success(|v| format!("got {v}"))
    ///     .on_failure(|e| format!("failed: {e}"))
    ///     .or_else(|| "pending".to_string());
    /// assert_eq!(label, "got 7");
    /// ```
    #[must_use]
    pub fn when<R>(&self) -> StateMatch<'_, T, E, R> {
        StateMatch {
            state: self,
            result: None,
        }
    }
}

/// Dispatch builder returned by [`CommandState::when`].
///
/// Each `on_*` arm fires immediately if the state matches and no earlier
/// arm has fired. Missing arms fall through to the terminal:
/// [`or_else`](Self::or_else) supplies a mandatory fallback,
/// [`finish`](Self::finish) yields `None` when nothing matched.
pub struct StateMatch<'a, T, E: std::fmt::Debug, R> {
    state: &'a CommandState<T, E>,
    result: Option<R>,
}

impl<'a, T, E: std::fmt::Debug, R> StateMatch<'a, T, E, R> {
    #[must_use]
    pub fn on_idle(mut self, f: impl FnOnce() -> R) -> Self {
        if self.result.is_none() && self.state.is_idle() {
            self.result = Some(f());
        }
        self
    }

    #[must_use]
    pub fn on_running(mut self, f: impl FnOnce() -> R) -> Self {
        if self.result.is_none() && self.state.is_running() {
            self.result = Some(f());
        }
        self
    }

    #[must_use]
    pub fn on_success(mut self, f: impl FnOnce(&'a T) -> R) -> Self {
        if self.result.is_none() {
            if let CommandState::Success(v) = self.state {
                self.result = Some(f(v));
            }
        }
        self
    }

    #[must_use]
    pub fn on_failure(mut self, f: impl FnOnce(&'a CommandError<E>) -> R) -> Self {
        if self.result.is_none() {
            if let CommandState::Failure(e) = self.state {
                self.result = Some(f(e));
            }
        }
        self
    }

    #[must_use]
    pub fn on_cancelled(mut self, f: impl FnOnce() -> R) -> Self {
        if self.result.is_none() && self.state.is_cancelled() {
            self.result = Some(f());
        }
        self
    }

    /// Terminal for the required form: a matched arm's result, or the
    /// fallback.
    pub fn or_else(self, f: impl FnOnce() -> R) -> R {
        self.result.unwrap_or_else(f)
    }

    /// Terminal for the optional form: a matched arm's result, or `None`.
    #[must_use]
    pub fn finish(self) -> Option<R> {
        self.result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    type State = CommandState<u32, String>;

    fn failure(msg: &str) -> State {
        CommandState::Failure(CommandError::Failed(msg.to_string()))
    }

    #[test]
    fn predicates_match_variants() {
        assert!(State::Idle.is_idle());
        assert!(State::Running.is_running());
        assert!(State::Success(1).is_success());
        assert!(failure("x").is_failure());
        assert!(State::Cancelled.is_cancelled());

        assert!(!State::Idle.is_running());
        assert!(!State::Success(1).is_failure());
    }

    #[test]
    fn tags_ignore_payloads() {
        assert!(State::Success(1).same_tag(&State::Success(2)));
        assert!(failure("a").same_tag(&failure("b")));
        assert!(!State::Success(1).same_tag(&failure("a")));
        assert_eq!(State::Running.tag(), StateTag::Running);
    }

    #[test]
    fn payload_accessors() {
        assert_eq!(State::Success(9).success(), Some(&9));
        assert_eq!(State::Idle.success(), None);
        assert!(failure("boom").failure().is_some());
        assert!(State::Running.failure().is_none());
    }

    #[test]
    fn when_dispatches_to_matching_arm() {
        let label = State::Success(7)
            .when()
            .on_idle(|| "idle".to_string())
            .on_success(|v| format!("ok {v}"))
            .on_failure(|_| "err".to_string())
            .or_else(|| "other".to_string());
        assert_eq!(label, "ok 7");
    }

    #[test]
    fn when_falls_back_to_or_else() {
        let label = State::Cancelled
            .when()
            .on_success(|_| "ok")
            .on_failure(|_| "err")
            .or_else(|| "fallback");
        assert_eq!(label, "fallback");
    }

    #[test]
    fn maybe_form_returns_none_without_match() {
        let out: Option<&str> = State::Running.when().on_success(|_| "ok").finish();
        assert_eq!(out, None);

        let out: Option<&str> = State::Running.when().on_running(|| "spinning").finish();
        assert_eq!(out, Some("spinning"));
    }

    #[test]
    fn first_matching_arm_wins() {
        // Only one arm can match a given tag, but a repeated arm must not
        // overwrite the earlier result.
        let out = State::Idle
            .when()
            .on_idle(|| 1)
            .on_idle(|| 2)
            .or_else(|| 0);
        assert_eq!(out, 1);
    }

    #[test]
    fn tag_display_is_lowercase() {
        assert_eq!(StateTag::Cancelled.to_string(), "cancelled");
        assert_eq!(StateTag::Idle.to_string(), "idle");
    }
}
