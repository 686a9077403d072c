//! Parallel directory traversal.
//!
//! A search runs in layers:
//!
//! 1. [`Searcher`] runs its roots one after the other on a rayon pool, all
//!    sharing one [`CancellationGate`].
//! 2. For each root the traversal engine plans twice. Planning walks down a
//!    chain of single-child directories, matching each level, and stops at
//!    the first directory that branches (or has no children). The branches
//!    found below the root are planned again in parallel.
//! 3. Every directory of the second plans is walked depth-first on its own
//!    worker. A walk emits the matches of a directory only after all of its
//!    children are done, so within one walk batches arrive in post-order.
//!
//! Matches reach the caller through a result sink as non-empty
//! [`MatchBatch`](crate::results::MatchBatch)es, either on the worker that
//! found them ([`DeliveryMode::Inline`](crate::config::DeliveryMode)) or on a
//! dispatcher thread that is drained before the completion notification
//! ([`DeliveryMode::Deferred`](crate::config::DeliveryMode)).
//!
//! Directories that vanish or cannot be read are skipped along with their
//! subtree. Cancellation is the only thing that ends a search early.
pub mod cancel;
pub mod coordinator;
pub(crate) mod engine;
pub mod matcher;
mod planner;
pub(crate) mod sink;
mod walker;

pub use cancel::{CancellationGate, Canceled, StopHandle};
pub use coordinator::{
    list_matches, list_matches_serial, list_matches_with, SearchEvent, SearchEvents,
    SearchOptions, Searcher,
};
pub use matcher::{MatchRule, Matcher, Predicate};
pub use sink::{BatchObserver, CompletionObserver};
