#![forbid(unsafe_code)]

//! Typed entry points binding fixed-arity actions to the engine.
//!
//! [`Command0`], [`Command1`], and [`Command2`] carry no state of their
//! own beyond the stored action: each partially applies its call-time
//! arguments and delegates to the shared [`Command`] execution routine.
//! Argument values are captured at call time and reach the action
//! unchanged, exactly once per accepted execution (a call skipped by the
//! already-Running guard never invokes the action).
//!
//! All three deref to the core [`Command`], so cancellation, reset,
//! subscription, history, caches, and projections are available directly
//! on the wrapper.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::command::{Command, CommandConfig};

macro_rules! delegate_common {
    () => {
        /// Replace the cancel callback.
        ///
        /// Invoked synchronously when cancellation is requested while
        /// Running; responsible for actually stopping the underlying work.
        #[must_use]
        pub fn on_cancel(self, callback: impl Fn() + 'static) -> Self {
            self.core.set_on_cancel(Rc::new(callback));
            self
        }

        /// The underlying engine handle.
        #[must_use]
        pub fn command(&self) -> &Command<T, E> {
            &self.core
        }
    };
}

/// A command whose action takes no arguments.
pub struct Command0<T, E: fmt::Debug> {
    core: Command<T, E>,
    action: Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, E>>>,
}

impl<T, E> Command0<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self::with_config(action, CommandConfig::default())
    }

    pub fn with_config<F, Fut>(action: F, config: CommandConfig) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            core: Command::with_config(config),
            action: Rc::new(move || Box::pin(action())),
        }
    }

    delegate_common!();

    /// Execute the action. No-op if already Running.
    pub async fn execute(&self) {
        let action = Rc::clone(&self.action);
        self.core.execute_with(move || action(), None).await;
    }

    /// Execute the action, racing it against `timeout`. If the timeout
    /// elapses first the execution is cancelled (observed state:
    /// Cancelled).
    pub async fn execute_with_timeout(&self, timeout: Duration) {
        let action = Rc::clone(&self.action);
        self.core.execute_with(move || action(), Some(timeout)).await;
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Command0<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command0").field("core", &self.core).finish()
    }
}

impl<T, E: fmt::Debug> Deref for Command0<T, E> {
    type Target = Command<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// A command whose action takes one argument.
pub struct Command1<A, T, E: fmt::Debug> {
    core: Command<T, E>,
    action: Rc<dyn Fn(A) -> LocalBoxFuture<'static, Result<T, E>>>,
}

impl<A, T, E> Command1<A, T, E>
where
    A: 'static,
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self::with_config(action, CommandConfig::default())
    }

    pub fn with_config<F, Fut>(action: F, config: CommandConfig) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            core: Command::with_config(config),
            action: Rc::new(move |a| Box::pin(action(a))),
        }
    }

    delegate_common!();

    /// Execute the action with `arg`. No-op if already Running.
    pub async fn execute(&self, arg: A) {
        let action = Rc::clone(&self.action);
        self.core.execute_with(move || action(arg), None).await;
    }

    /// Execute with `arg`, racing the action against `timeout`.
    pub async fn execute_with_timeout(&self, arg: A, timeout: Duration) {
        let action = Rc::clone(&self.action);
        self.core
            .execute_with(move || action(arg), Some(timeout))
            .await;
    }
}

impl<A, T: fmt::Debug, E: fmt::Debug> fmt::Debug for Command1<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command1").field("core", &self.core).finish()
    }
}

impl<A, T, E: fmt::Debug> Deref for Command1<A, T, E> {
    type Target = Command<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// A command whose action takes two arguments.
pub struct Command2<A, B, T, E: fmt::Debug> {
    core: Command<T, E>,
    #[allow(clippy::type_complexity)]
    action: Rc<dyn Fn(A, B) -> LocalBoxFuture<'static, Result<T, E>>>,
}

impl<A, B, T, E> Command2<A, B, T, E>
where
    A: 'static,
    B: 'static,
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(A, B) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self::with_config(action, CommandConfig::default())
    }

    pub fn with_config<F, Fut>(action: F, config: CommandConfig) -> Self
    where
        F: Fn(A, B) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            core: Command::with_config(config),
            action: Rc::new(move |a, b| Box::pin(action(a, b))),
        }
    }

    delegate_common!();

    /// Execute the action with `(a, b)`. No-op if already Running.
    pub async fn execute(&self, a: A, b: B) {
        let action = Rc::clone(&self.action);
        self.core.execute_with(move || action(a, b), None).await;
    }

    /// Execute with `(a, b)`, racing the action against `timeout`.
    pub async fn execute_with_timeout(&self, a: A, b: B, timeout: Duration) {
        let action = Rc::clone(&self.action);
        self.core
            .execute_with(move || action(a, b), Some(timeout))
            .await;
    }
}

impl<A, B, T: fmt::Debug, E: fmt::Debug> fmt::Debug for Command2<A, B, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command2").field("core", &self.core).finish()
    }
}

impl<A, B, T, E: fmt::Debug> Deref for Command2<A, B, T, E> {
    type Target = Command<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateTag;

    #[tokio::test]
    async fn command0_executes_stored_action() {
        let command: Command0<u32, String> = Command0::new(|| async { Ok(11) });
        command.execute().await;
        assert_eq!(command.cached_success(), Some(11));
    }

    #[tokio::test]
    async fn command1_passes_argument_unchanged() {
        let command: Command1<u32, u32, String> = Command1::new(|n| async move { Ok(n * 2) });
        command.execute(21).await;
        assert_eq!(command.cached_success(), Some(42));
    }

    #[tokio::test]
    async fn command2_passes_both_arguments() {
        let command: Command2<u32, u32, u32, String> =
            Command2::new(|a, b| async move { Ok(a + b) });
        command.execute(40, 2).await;
        assert_eq!(command.cached_success(), Some(42));
    }

    #[tokio::test]
    async fn deref_exposes_engine_surface() {
        let command: Command0<u32, String> = Command0::new(|| async { Ok(1) });
        assert!(command.state().is_idle());
        command.execute().await;
        command.reset();
        assert_eq!(command.tag(), StateTag::Idle);
        assert_eq!(command.cached_success(), None);
    }

    #[tokio::test]
    async fn config_and_on_cancel_flow_through() {
        let command: Command0<u32, String> = Command0::with_config(
            || async { Ok(1) },
            CommandConfig::named("adder").with_max_history(3),
        )
        .on_cancel(|| {});
        assert_eq!(command.name().as_deref(), Some("adder"));

        command.execute().await;
        command.reset();
        command.execute().await;
        // Bounded at 3: the older transitions were evicted.
        assert_eq!(command.state_history().len(), 3);
    }

    #[tokio::test]
    async fn command1_argument_captured_per_call() {
        let command: Command1<String, String, String> =
            Command1::new(|s: String| async move { Ok(s) });
        command.execute("first".to_string()).await;
        assert_eq!(command.cached_success().as_deref(), Some("first"));

        command.execute("second".to_string()).await;
        assert_eq!(command.cached_success().as_deref(), Some("second"));
    }
}
