#![forbid(unsafe_code)]

//! Bounded transition history.
//!
//! Every accepted state transition is recorded as an immutable
//! [`HistoryEntry`] in a FIFO log bounded by a configurable maximum
//! length. When the bound is exceeded the oldest entries are evicted one
//! at a time until the length equals the limit; the relative order of the
//! survivors never changes.
//!
//! Entries are owned exclusively by the command that produced them and are
//! never mutated after creation. [`StateHistory::snapshot`] hands out a
//! defensive copy, so callers can never observe later mutations through a
//! previously obtained snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use web_time::Instant;

use crate::state::CommandState;

/// String-keyed metadata attached to a history entry.
pub type Metadata = BTreeMap<String, String>;

/// Default bound for [`StateHistory`].
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// One recorded transition: the state entered, when, and optional notes.
#[derive(Debug, Clone)]
pub struct HistoryEntry<T, E: fmt::Debug> {
    pub state: CommandState<T, E>,
    pub recorded_at: Instant,
    pub metadata: Option<Metadata>,
}

/// Append-only, bounded log of state transitions.
pub(crate) struct StateHistory<T, E: fmt::Debug> {
    entries: VecDeque<HistoryEntry<T, E>>,
    max_len: usize,
}

impl<T, E: fmt::Debug> StateHistory<T, E> {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone, E: fmt::Debug + Clone> StateHistory<T, E> {
    /// An empty history bounded at `max_len` entries.
    ///
    /// A bound of zero is clamped to one: the engine relies on the first
    /// recorded Idle staying observable.
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append an entry timestamped now, evicting the oldest entries while
    /// the bound is exceeded.
    pub(crate) fn record(&mut self, state: CommandState<T, E>, metadata: Option<Metadata>) {
        self.entries.push_back(HistoryEntry {
            state,
            recorded_at: Instant::now(),
            metadata,
        });
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
    }

    /// Defensive copy of the log, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<HistoryEntry<T, E>> {
        self.entries.iter().cloned().collect()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for StateHistory<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHistory")
            .field("len", &self.entries.len())
            .field("max_len", &self.max_len)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateTag;
    use proptest::prelude::*;

    type History = StateHistory<u32, String>;

    fn state_for(n: u32) -> CommandState<u32, String> {
        // Cycle through tags so sequences exercise every variant.
        match n % 5 {
            0 => CommandState::Idle,
            1 => CommandState::Running,
            2 => CommandState::Success(n),
            3 => CommandState::Failure(crate::CommandError::Failed(format!("e{n}"))),
            _ => CommandState::Cancelled,
        }
    }

    #[test]
    fn records_in_order() {
        let mut h = History::new(10);
        h.record(CommandState::Idle, None);
        h.record(CommandState::Running, None);
        h.record(CommandState::Success(1), None);

        let snap = h.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].state.tag(), StateTag::Idle);
        assert_eq!(snap[1].state.tag(), StateTag::Running);
        assert_eq!(snap[2].state.tag(), StateTag::Success);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut h = History::new(2);
        h.record(CommandState::Idle, None);
        h.record(CommandState::Running, None);
        h.record(CommandState::Success(7), None);

        let snap = h.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].state.tag(), StateTag::Running);
        assert_eq!(snap[1].state.tag(), StateTag::Success);
    }

    #[test]
    fn zero_bound_clamps_to_one() {
        let mut h = History::new(0);
        h.record(CommandState::Idle, None);
        h.record(CommandState::Running, None);
        assert_eq!(h.len(), 1);
        assert_eq!(h.snapshot()[0].state.tag(), StateTag::Running);
    }

    #[test]
    fn snapshot_is_defensive() {
        let mut h = History::new(10);
        h.record(CommandState::Idle, None);
        let snap = h.snapshot();

        h.record(CommandState::Running, None);
        assert_eq!(snap.len(), 1);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn metadata_carried_through() {
        let mut h = History::new(10);
        let mut meta = Metadata::new();
        meta.insert("note".to_string(), "execution started".to_string());
        h.record(CommandState::Running, Some(meta));

        let snap = h.snapshot();
        let meta = snap[0].metadata.as_ref().expect("metadata present");
        assert_eq!(meta.get("note").map(String::as_str), Some("execution started"));
    }

    proptest! {
        #[test]
        fn bound_holds_and_keeps_most_recent(
            seq in proptest::collection::vec(0u32..50, 0..40),
            max_len in 1usize..8,
        ) {
            let mut h = History::new(max_len);
            for &n in &seq {
                h.record(state_for(n), None);
            }
            prop_assert_eq!(h.len(), seq.len().min(max_len));

            // Survivors are exactly the most recent records, order preserved.
            let snap = h.snapshot();
            let expected_tags: Vec<_> = seq
                .iter()
                .rev()
                .take(max_len)
                .rev()
                .map(|&n| state_for(n).tag())
                .collect();
            let actual_tags: Vec<_> = snap.iter().map(|e| e.state.tag()).collect();
            prop_assert_eq!(actual_tags, expected_tags);
        }
    }
}
