#![forbid(unsafe_code)]

//! Observable async command state machine.
//!
//! This crate wraps an asynchronous action — any future resolving to
//! `Result<T, E>` — in an observable [`Command`] that tracks its execution
//! lifecycle, supports cooperative cancellation and timeouts, caches the
//! most recent outcomes, and keeps a bounded history of state transitions
//! for diagnostics. It is built to sit underneath a UI layer that
//! re-renders in response to state changes.
//!
//! # Key Components
//!
//! - [`CommandState`] - The closed set of lifecycle states (Idle, Running,
//!   Success, Failure, Cancelled) with predicates and [`StateMatch`]
//!   dispatch
//! - [`Command0`] / [`Command1`] / [`Command2`] - Typed entry points for
//!   actions of fixed arity, all deref-ing to the core [`Command`] engine
//! - [`CommandRef`] - A command whose input is derived reactively from
//!   [`Observable`]s discovered through a [`ReadContext`]
//! - [`StateView`] - A sparse projection of command state into a simpler
//!   derived observable
//! - [`set_observer`] / [`clear_observer`] - A process-wide hook receiving
//!   every accepted transition from every command
//!
//! # Concurrency model
//!
//! Single-threaded cooperative: handles are `Rc`-based, actions are
//! non-Send local futures, and the only suspension point is the await on
//! the action itself. Cancellation is cooperative — the engine flips the
//! observable state and invokes the configured cancel callback, which is
//! responsible for actually stopping the underlying work. A cancelled
//! action that completes anyway has its stale result discarded.
//!
//! # Example
//!
//! ```
//! use observable_command::{Command0, StateTag};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fetch: Command0<String, String> = Command0::new(|| async {
//!     Ok("payload".to_string())
//! });
//!
//! let _sub = fetch.subscribe(|| { /* schedule a re-render */ });
//!
//! fetch.execute().await;
//! assert_eq!(fetch.tag(), StateTag::Success);
//! assert_eq!(fetch.cached_success().as_deref(), Some("payload"));
//! # }
//! ```

mod arity;
mod command;
mod command_ref;
mod error;
mod history;
mod observable;
mod observer;
mod projection;
mod state;

pub use arity::{Command0, Command1, Command2};
pub use command::{Command, CommandConfig};
pub use command_ref::{CommandRef, ReadContext};
pub use error::CommandError;
pub use history::{DEFAULT_MAX_HISTORY, HistoryEntry, Metadata};
pub use observable::{Observable, Subscription};
pub use observer::{TransitionEvent, clear_observer, observer_installed, set_observer};
pub use projection::StateView;
pub use state::{CommandState, StateMatch, StateTag};
