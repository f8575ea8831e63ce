#![forbid(unsafe_code)]

//! Command execution engine.
//!
//! [`Command`] owns the current [`CommandState`], orchestrates execution of
//! an asynchronous action, handles cancellation and timeout, caches the
//! most recent success/failure payloads, appends accepted transitions to a
//! bounded history, and fans notifications out to local subscribers and the
//! process-wide observer.
//!
//! # State machine
//!
//! ```text
//! Idle --execute--> Running --ok--> Success
//!                   Running --err/panic--> Failure
//!                   Running --cancel()--> Cancelled   (Failure if the
//!                                         cancel callback panics)
//!                   Running --timeout--> cancel() path --> Cancelled
//! Success|Failure|Cancelled --reset()--> Idle
//! ```
//!
//! # Transition acceptance
//!
//! `set_state` accepts a new state only when its [`StateTag`] differs from
//! the current one, or when the history is still empty (so the very first
//! Idle is always recorded). Back-to-back same-tag states with *different
//! payloads* are therefore suppressed for history and notification — only
//! the first is observed downstream. The success/failure caches are still
//! updated on suppressed transitions, so the latest payloads remain
//! retrievable. This payload-blind comparison is deliberate and pinned by
//! tests; do not "fix" it to payload equality.
//!
//! # Concurrency
//!
//! Single-threaded cooperative: the only suspension point is the await on
//! the user-supplied action inside [`execute_with`](Command::execute_with).
//! `cancel`, `reset`, and `set_state` run to completion synchronously, so
//! transitions of one instance are strictly sequential. Cancellation is
//! cooperative — the engine never kills the action; a cancelled action
//! that later completes anyway has its result silently discarded because
//! the command is no longer Running.

use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::error::CommandError;
use crate::history::{DEFAULT_MAX_HISTORY, HistoryEntry, Metadata, StateHistory};
use crate::observable::Subscription;
use crate::observer::{self, TransitionEvent};
use crate::state::{CommandState, StateTag};

const TRACE_TARGET: &str = "observable_command::command";

/// Configuration captured at command construction.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Bound on the transition history (oldest entries evicted first).
    pub max_history: usize,
    /// Debug name surfaced through tracing and the global observer.
    pub name: Option<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            name: None,
        }
    }
}

impl CommandConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }
}

type ChangeCallback = Rc<dyn Fn()>;
type ChangeCallbackWeak = Weak<dyn Fn()>;

struct CommandInner<T, E: fmt::Debug> {
    state: CommandState<T, E>,
    cached_success: Option<T>,
    cached_failure: Option<CommandError<E>>,
    on_cancel: Option<Rc<dyn Fn()>>,
    history: StateHistory<T, E>,
    subscribers: Vec<ChangeCallbackWeak>,
    name: Option<String>,
}

/// Observable wrapper around an asynchronous action's execution lifecycle.
///
/// Cloning a `Command` clones the handle, not the machine: all clones share
/// state, caches, history, and subscribers.
pub struct Command<T, E: fmt::Debug> {
    inner: Rc<RefCell<CommandInner<T, E>>>,
}

impl<T, E: fmt::Debug> Clone for Command<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Command<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Command")
            .field("name", &inner.name)
            .field("state", &inner.state)
            .field("history_len", &inner.history.len())
            .finish()
    }
}

impl<T, E> Command<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Build a command in the Idle state, recording Idle as the first
    /// history entry.
    pub(crate) fn with_config(config: CommandConfig) -> Self {
        let command = Self {
            inner: Rc::new(RefCell::new(CommandInner {
                state: CommandState::Idle,
                cached_success: None,
                cached_failure: None,
                on_cancel: None,
                history: StateHistory::new(config.max_history),
                subscribers: Vec::new(),
                name: config.name,
            })),
        };
        command.set_state(CommandState::Idle, Some(note("created")));
        command
    }

    pub(crate) fn set_on_cancel(&self, callback: Rc<dyn Fn()>) {
        self.inner.borrow_mut().on_cancel = Some(callback);
    }

    /// Clone of the current state.
    #[must_use]
    pub fn state(&self) -> CommandState<T, E> {
        self.inner.borrow().state.clone()
    }

    /// Access the current state by reference without cloning.
    pub fn with_state<R>(&self, f: impl FnOnce(&CommandState<T, E>) -> R) -> R {
        f(&self.inner.borrow().state)
    }

    /// Tag of the current state.
    #[must_use]
    pub fn tag(&self) -> StateTag {
        self.inner.borrow().state.tag()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.borrow().state.is_running()
    }

    /// Debug name, if configured.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    /// Defensive snapshot of the transition history, oldest first.
    #[must_use]
    pub fn state_history(&self) -> Vec<HistoryEntry<T, E>> {
        self.inner.borrow().history.snapshot()
    }

    /// Last Success payload observed, surviving resets of the current state
    /// until [`reset`](Self::reset) clears it.
    #[must_use]
    pub fn cached_success(&self) -> Option<T> {
        self.inner.borrow().cached_success.clone()
    }

    /// Last Failure payload observed; same lifetime rules as
    /// [`cached_success`](Self::cached_success).
    #[must_use]
    pub fn cached_failure(&self) -> Option<CommandError<E>> {
        self.inner.borrow().cached_failure.clone()
    }

    /// Subscribe a zero-argument change callback, invoked after every
    /// accepted transition. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let strong: ChangeCallback = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription::from_guard(Box::new(strong))
    }

    /// Run the action produced by `make`, driving the state machine.
    ///
    /// No-op if the command is already Running — at most one execution is
    /// in flight per instance, and `make` is not even invoked for a
    /// skipped call. Otherwise transitions to Running, awaits the action
    /// (the engine's only suspension point), and applies the outcome:
    ///
    /// - `Ok(v)` → `Success(v)`
    /// - `Err(e)` → `Failure(CommandError::Failed(e))`
    /// - panic → `Failure(CommandError::Panicked)`, with the message and a
    ///   best-effort backtrace in the entry metadata
    /// - timeout elapsed → the cancellation path runs first (state becomes
    ///   Cancelled, the cancel callback fires), then the synthetic
    ///   `Failure(CommandError::TimedOut)` is discarded by the
    ///   still-Running re-check below
    ///
    /// The outcome is applied only if the command is *still* Running when
    /// the action settles; a cancellation that raced in during the await
    /// wins and the computed outcome is dropped.
    ///
    /// Errors are never propagated to the caller — the call always returns
    /// normally and the outcome is observed via state and subscriptions.
    pub async fn execute_with(
        &self,
        make: impl FnOnce() -> LocalBoxFuture<'static, Result<T, E>>,
        timeout: Option<Duration>,
    ) {
        if self.is_running() {
            tracing::debug!(
                target: TRACE_TARGET,
                command = self.name().as_deref().unwrap_or("<unnamed>"),
                "execute skipped: already running"
            );
            return;
        }

        let mut start_meta = note("execution started");
        if let Some(limit) = timeout {
            start_meta.insert("timeout".to_string(), format!("{limit:?}"));
        }
        self.set_state(CommandState::Running, Some(start_meta));

        let work = AssertUnwindSafe(make()).catch_unwind();

        let (next, meta): (CommandState<T, E>, Option<Metadata>) = match timeout {
            None => fold_outcome(work.await),
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(settled) => fold_outcome(settled),
                Err(_elapsed) => {
                    tracing::debug!(
                        target: TRACE_TARGET,
                        command = self.name().as_deref().unwrap_or("<unnamed>"),
                        timeout = ?limit,
                        "timeout elapsed, entering cancellation path"
                    );
                    self.cancel_with(note(format!("timed out after {limit:?}")));
                    // Synthetic failure for the internal flow only; the
                    // cancellation above has already left Running, so the
                    // guard below discards it.
                    (
                        CommandState::Failure(CommandError::TimedOut(limit)),
                        None,
                    )
                }
            },
        };

        if !self.is_running() {
            tracing::trace!(
                target: TRACE_TARGET,
                command = self.name().as_deref().unwrap_or("<unnamed>"),
                discarded = %next.tag(),
                "stale completion discarded: no longer running"
            );
            return;
        }
        self.set_state(next, meta);
    }

    /// Cancel an in-flight execution with default metadata.
    ///
    /// See [`cancel_with`](Self::cancel_with).
    pub fn cancel(&self) {
        self.cancel_with(note("cancelled"));
    }

    /// Cancel an in-flight execution.
    ///
    /// No-op unless Running. Invokes the cancel callback synchronously; a
    /// panicking callback turns the outcome into Failure instead of
    /// Cancelled. Cancellation is cooperative: stopping the underlying
    /// work is the callback's job, the engine only moves the observable
    /// state.
    pub fn cancel_with(&self, metadata: Metadata) {
        if !self.is_running() {
            tracing::trace!(
                target: TRACE_TARGET,
                command = self.name().as_deref().unwrap_or("<unnamed>"),
                "cancel skipped: not running"
            );
            return;
        }

        let callback = self.inner.borrow().on_cancel.clone();
        if let Some(callback) = callback {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
                let error = CommandError::from_panic(payload);
                let mut meta = metadata;
                meta.insert(
                    "cancel_error".to_string(),
                    "cancel callback panicked".to_string(),
                );
                meta.insert(
                    "backtrace".to_string(),
                    std::backtrace::Backtrace::force_capture().to_string(),
                );
                self.set_state(CommandState::Failure(error), Some(meta));
                return;
            }
        }
        self.set_state(CommandState::Cancelled, Some(metadata));
    }

    /// Reset to Idle with default metadata.
    ///
    /// See [`reset_with`](Self::reset_with).
    pub fn reset(&self) {
        self.reset_with(note("reset"));
    }

    /// Reset to Idle, clearing both outcome caches.
    ///
    /// No-op while Running — an in-flight execution cannot be reset.
    /// Resetting an already-Idle command clears the caches but records no
    /// new transition (same-tag suppression).
    pub fn reset_with(&self, metadata: Metadata) {
        if self.is_running() {
            tracing::trace!(
                target: TRACE_TARGET,
                command = self.name().as_deref().unwrap_or("<unnamed>"),
                "reset skipped: running"
            );
            return;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.cached_success = None;
            inner.cached_failure = None;
        }
        self.set_state(CommandState::Idle, Some(metadata));
    }

    /// Apply a transition through the acceptance protocol.
    ///
    /// Order of operations on acceptance: update caches, store the state,
    /// record history, notify the global observer, notify local
    /// subscribers. Caches are updated even when the transition is
    /// suppressed. A panicking subscriber is contained: it cannot prevent
    /// history recording, the observer, or later subscribers.
    pub(crate) fn set_state(&self, next: CommandState<T, E>, metadata: Option<Metadata>) {
        let accepted = {
            let mut inner = self.inner.borrow_mut();
            match &next {
                CommandState::Success(v) => inner.cached_success = Some(v.clone()),
                CommandState::Failure(e) => inner.cached_failure = Some(e.clone()),
                _ => {}
            }
            let accepted = inner.history.is_empty() || !inner.state.same_tag(&next);
            if accepted {
                inner.state = next.clone();
                inner.history.record(next.clone(), metadata.clone());
            }
            accepted
        };

        if !accepted {
            tracing::trace!(
                target: TRACE_TARGET,
                command = self.name().as_deref().unwrap_or("<unnamed>"),
                tag = %next.tag(),
                "same-tag transition suppressed"
            );
            return;
        }

        tracing::debug!(
            target: TRACE_TARGET,
            command = self.name().as_deref().unwrap_or("<unnamed>"),
            tag = %next.tag(),
            "state transition"
        );

        let name = self.name();
        observer::notify(&TransitionEvent {
            command: name.as_deref(),
            tag: next.tag(),
            metadata: metadata.as_ref(),
        });

        let callbacks: Vec<ChangeCallback> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|w| w.upgrade())
                .collect()
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                tracing::warn!(
                    target: TRACE_TARGET,
                    command = self.name().as_deref().unwrap_or("<unnamed>"),
                    "subscriber panicked during notification"
                );
            }
        }
    }
}

/// Fold a settled (possibly unwound) action result into the next state.
fn fold_outcome<T, E: fmt::Debug>(
    settled: Result<Result<T, E>, Box<dyn std::any::Any + Send>>,
) -> (CommandState<T, E>, Option<Metadata>) {
    match settled {
        Ok(Ok(value)) => (CommandState::Success(value), None),
        Ok(Err(error)) => (CommandState::Failure(CommandError::Failed(error)), None),
        Err(payload) => {
            let error: CommandError<E> = CommandError::from_panic(payload);
            let mut meta = note("unexpected error while executing action");
            if let CommandError::Panicked { message } = &error {
                meta.insert("error".to_string(), message.clone());
            }
            meta.insert(
                "backtrace".to_string(),
                std::backtrace::Backtrace::force_capture().to_string(),
            );
            (CommandState::Failure(error), Some(meta))
        }
    }
}

fn note(text: impl Into<String>) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("note".to_string(), text.into());
    meta
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
