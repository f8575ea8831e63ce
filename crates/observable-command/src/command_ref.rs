#![forbid(unsafe_code)]

//! Commands whose inputs are derived reactively from observables.
//!
//! A [`CommandRef`] couples a *derivation* function with an action. The
//! derivation receives a [`ReadContext`] and pulls current values out of
//! any number of [`Observable`]s; every observable it reads is tracked,
//! and any change notification from a tracked observable re-runs the
//! derivation and re-executes the action with the freshly derived input.
//!
//! # Dependency discovery
//!
//! Tracking is dynamic: each [`ReadContext::read`] registers the
//! observable if it is not already tracked (re-reading a tracked
//! observable never double-subscribes). A derivation whose reads are
//! input-dependent can therefore grow its dependency set across runs.
//!
//! # Re-trigger policy
//!
//! Per notification, not per distinct value: writing the same value to a
//! tracked observable again still re-executes. Execution remains subject
//! to the engine's already-Running guard.
//!
//! # Runtime requirement
//!
//! Retriggered executions are spawned with `tokio::task::spawn_local`, so
//! tracked observables must be mutated from within a `tokio::task::LocalSet`
//! (or another context where `spawn_local` is available).

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::command::{Command, CommandConfig};
use crate::observable::{Observable, Subscription};

/// Read capability handed to the derivation function.
///
/// Every `read` both returns the observable's current value and ensures
/// the observable is tracked for change notifications.
pub struct ReadContext {
    tracked: HashSet<usize>,
    pending: Vec<(usize, PendingSubscribe)>,
}

type PendingSubscribe = Box<dyn FnOnce(Rc<dyn Fn()>) -> Subscription>;

impl ReadContext {
    fn with_tracked(tracked: HashSet<usize>) -> Self {
        Self {
            tracked,
            pending: Vec::new(),
        }
    }

    /// Read the current value of `observable`, tracking it for changes.
    ///
    /// Idempotent per observable: reading one that is already tracked
    /// only returns its value.
    pub fn read<V: Clone + 'static>(&mut self, observable: &Observable<V>) -> V {
        let id = observable.id();
        if self.tracked.insert(id) {
            let observable = observable.clone();
            self.pending.push((
                id,
                Box::new(move |trigger: Rc<dyn Fn()>| observable.subscribe(move |_| trigger())),
            ));
        }
        observable.get()
    }
}

impl fmt::Debug for ReadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadContext")
            .field("tracked", &self.tracked.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

struct CommandRefShared<A, T, E: fmt::Debug> {
    core: Command<T, E>,
    action: Rc<dyn Fn(A) -> LocalBoxFuture<'static, Result<T, E>>>,
    derive: Box<dyn Fn(&mut ReadContext) -> A>,
    /// Live subscriptions keyed by observable identity.
    deps: RefCell<HashMap<usize, Subscription>>,
    disposed: Cell<bool>,
}

/// A command whose action input is derived from tracked observables.
///
/// Cloning produces another handle to the same underlying command and
/// dependency set.
pub struct CommandRef<A, T, E: fmt::Debug> {
    shared: Rc<CommandRefShared<A, T, E>>,
}

impl<A, T, E: fmt::Debug> Clone for CommandRef<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<A, T, E> CommandRef<A, T, E>
where
    A: 'static,
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Build a reactive command.
    ///
    /// The derivation runs once immediately to discover the initial
    /// dependency set; the action is *not* executed until a tracked
    /// observable notifies or [`execute`](Self::execute) is called.
    pub fn new<D, F, Fut>(derive: D, action: F) -> Self
    where
        D: Fn(&mut ReadContext) -> A + 'static,
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self::with_config(derive, action, CommandConfig::default())
    }

    pub fn with_config<D, F, Fut>(derive: D, action: F, config: CommandConfig) -> Self
    where
        D: Fn(&mut ReadContext) -> A + 'static,
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let this = Self {
            shared: Rc::new(CommandRefShared {
                core: Command::with_config(config),
                action: Rc::new(move |a| Box::pin(action(a))),
                derive: Box::new(derive),
                deps: RefCell::new(HashMap::new()),
                disposed: Cell::new(false),
            }),
        };
        // Discovery pass: subscribe to everything the derivation reads.
        let _ = this.derive_and_track();
        this
    }

    /// Derive the action input now and execute immediately.
    ///
    /// Subject to the same already-Running guard as any execution.
    pub async fn execute(&self) {
        self.refresh().await;
    }

    /// Stop reacting: drop every tracked subscription. Idempotent; a
    /// disposed command no longer re-executes on observable changes
    /// (manual [`execute`](Self::execute) calls are also ignored).
    pub fn dispose(&self) {
        self.shared.disposed.set(true);
        self.shared.deps.borrow_mut().clear();
    }

    /// Number of observables currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.shared.deps.borrow().len()
    }

    /// The underlying engine handle.
    #[must_use]
    pub fn command(&self) -> &Command<T, E> {
        &self.shared.core
    }

    async fn refresh(&self) {
        if self.shared.disposed.get() {
            return;
        }
        let value = self.derive_and_track();
        let action = Rc::clone(&self.shared.action);
        self.shared
            .core
            .execute_with(move || action(value), None)
            .await;
    }

    /// Run the derivation, subscribing to any newly read observables.
    fn derive_and_track(&self) -> A {
        let tracked: HashSet<usize> = self.shared.deps.borrow().keys().copied().collect();
        let mut cx = ReadContext::with_tracked(tracked);
        let value = (self.shared.derive)(&mut cx);

        if !cx.pending.is_empty() {
            let trigger = Self::trigger(&self.shared);
            let mut deps = self.shared.deps.borrow_mut();
            for (id, subscribe) in cx.pending {
                deps.insert(id, subscribe(Rc::clone(&trigger)));
            }
            tracing::trace!(
                target: "observable_command::command_ref",
                tracked = deps.len(),
                "dependency set updated"
            );
        }
        value
    }

    /// Change-notification callback installed on every tracked observable.
    ///
    /// Holds only a weak handle so tracked observables do not keep the
    /// command alive.
    fn trigger(shared: &Rc<CommandRefShared<A, T, E>>) -> Rc<dyn Fn()> {
        let weak = Rc::downgrade(shared);
        Rc::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if shared.disposed.get() {
                return;
            }
            let handle = CommandRef { shared };
            tokio::task::spawn_local(async move {
                handle.refresh().await;
            });
        })
    }
}

impl<A, T: fmt::Debug, E: fmt::Debug> fmt::Debug for CommandRef<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRef")
            .field("core", &self.shared.core)
            .field("tracked", &self.shared.deps.borrow().len())
            .field("disposed", &self.shared.disposed.get())
            .finish()
    }
}

impl<A, T, E: fmt::Debug> Deref for CommandRef<A, T, E> {
    type Target = Command<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.shared.core
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
