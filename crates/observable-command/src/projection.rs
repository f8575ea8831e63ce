#![forbid(unsafe_code)]

//! Derived observables projected from command state.
//!
//! [`Command::filter`] maps the command's state stream through a transform
//! into a simpler observable value. The projection is sparse: source
//! changes whose transform result is `None` produce no value change and no
//! notification, so a projection can surface only the states it cares
//! about (say, formatted Success/Failure text) while Running/Idle churn
//! passes by silently.

use std::fmt;

use crate::command::Command;
use crate::observable::{Observable, Subscription};
use crate::state::CommandState;

/// Read-only observable view over a command's state, shaped by a
/// transform.
///
/// Owns its subscription to the source command; dropping the view
/// unsubscribes.
pub struct StateView<W> {
    value: Observable<W>,
    _source: Subscription,
}

impl<W: Clone + 'static> StateView<W> {
    /// Current projected value.
    #[must_use]
    pub fn get(&self) -> W {
        self.value.get()
    }

    /// Subscribe to projected value changes.
    pub fn subscribe(&self, callback: impl Fn(&W) + 'static) -> Subscription {
        self.value.subscribe(callback)
    }
}

impl<W: fmt::Debug> fmt::Debug for StateView<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateView")
            .field("value", &self.value)
            .finish()
    }
}

impl<T, E> Command<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Project this command's state into a derived observable.
    ///
    /// Starts at `default`. After every accepted transition the transform
    /// runs against the new state: `Some(w)` updates the view and notifies
    /// its subscribers, `None` leaves it untouched.
    #[must_use]
    pub fn filter<W: Clone + 'static>(
        &self,
        default: W,
        transform: impl Fn(&CommandState<T, E>) -> Option<W> + 'static,
    ) -> StateView<W> {
        let value = Observable::new(default);
        let source = self.clone();
        let sink = value.clone();
        let subscription = self.subscribe(move || {
            if let Some(next) = source.with_state(|state| transform(state)) {
                sink.set(next);
            }
        });
        StateView {
            value,
            _source: subscription,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
