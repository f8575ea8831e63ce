#![forbid(unsafe_code)]

//! Process-wide transition observer.
//!
//! A single optional hook receives every accepted state transition from
//! every command on the current thread. Intended for cross-cutting logging
//! in the consuming application.
//!
//! Registration is last-wins: installing a new observer replaces the
//! previous one, there is no fan-out. Tests that install an observer must
//! call [`clear_observer`] before finishing so later cases start clean.
//!
//! The hook is thread-local, matching the crate's single-threaded
//! cooperative model — registration and notification always happen on the
//! same thread, so no locking is involved.

use std::cell::RefCell;
use std::rc::Rc;

use crate::history::Metadata;
use crate::state::StateTag;

/// A type-erased view of one accepted transition, handed to the global
/// observer.
///
/// Payloads are erased: the observer sees the tag, the command's debug
/// name (if configured), and the transition metadata.
#[derive(Debug)]
pub struct TransitionEvent<'a> {
    /// Debug name of the command that transitioned, if it has one.
    pub command: Option<&'a str>,
    /// Tag of the state entered.
    pub tag: StateTag,
    /// Metadata recorded with the transition.
    pub metadata: Option<&'a Metadata>,
}

type Observer = Rc<dyn Fn(&TransitionEvent<'_>)>;

thread_local! {
    static OBSERVER: RefCell<Option<Observer>> = const { RefCell::new(None) };
}

/// Install the process-wide observer, replacing any previous one.
pub fn set_observer(observer: impl Fn(&TransitionEvent<'_>) + 'static) {
    OBSERVER.with(|slot| {
        *slot.borrow_mut() = Some(Rc::new(observer));
    });
}

/// Remove the process-wide observer, if any.
pub fn clear_observer() {
    OBSERVER.with(|slot| {
        slot.borrow_mut().take();
    });
}

/// Whether an observer is currently installed.
#[must_use]
pub fn observer_installed() -> bool {
    OBSERVER.with(|slot| slot.borrow().is_some())
}

/// Deliver one transition to the installed observer, if any.
///
/// The observer is cloned out of the slot before the call, so an observer
/// that re-registers or clears itself mid-callback does not deadlock the
/// slot borrow.
pub(crate) fn notify(event: &TransitionEvent<'_>) {
    let observer = OBSERVER.with(|slot| slot.borrow().clone());
    if let Some(observer) = observer {
        observer(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn event(tag: StateTag) -> TransitionEvent<'static> {
        TransitionEvent {
            command: None,
            tag,
            metadata: None,
        }
    }

    #[test]
    fn observer_receives_notifications() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        set_observer(move |e| seen_clone.borrow_mut().push(e.tag));

        notify(&event(StateTag::Running));
        notify(&event(StateTag::Success));

        assert_eq!(*seen.borrow(), vec![StateTag::Running, StateTag::Success]);
        clear_observer();
    }

    #[test]
    fn last_registration_wins() {
        let first = Rc::new(Cell::new(0u32));
        let second = Rc::new(Cell::new(0u32));

        let first_clone = Rc::clone(&first);
        set_observer(move |_| first_clone.set(first_clone.get() + 1));
        let second_clone = Rc::clone(&second);
        set_observer(move |_| second_clone.set(second_clone.get() + 1));

        notify(&event(StateTag::Idle));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        clear_observer();
    }

    #[test]
    fn clear_stops_delivery() {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        set_observer(move |_| count_clone.set(count_clone.get() + 1));
        assert!(observer_installed());

        clear_observer();
        assert!(!observer_installed());

        notify(&event(StateTag::Cancelled));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn observer_may_clear_itself_mid_callback() {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        set_observer(move |_| {
            count_clone.set(count_clone.get() + 1);
            clear_observer();
        });

        notify(&event(StateTag::Failure));
        notify(&event(StateTag::Failure));
        assert_eq!(count.get(), 1);
    }
}
