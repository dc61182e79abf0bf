//! Branches: tasks with any number of children.
//!
//! - Single-running branches ([`Sequence`], [`Selector`], [`SelectorN`],
//!   [`Switch`], [`ActiveSelector`]) run at most one child at a time.
//! - Parallel branches ([`SimpleParallel`], [`ServiceParallel`], [`Join`])
//!   advance several children within the same tick.

mod active_selector;
pub mod join;
mod parallel;
mod selector;
mod selector_n;
mod sequence;
mod single_running;
mod switch;

pub use active_selector::ActiveSelector;
pub use join::{Join, JoinMain, JoinPolicy, JoinSelector, JoinSelectorN, JoinSequence, JoinWaitAll};
pub use parallel::{ServiceParallel, SimpleParallel};
pub use selector::Selector;
pub use selector_n::SelectorN;
pub use sequence::Sequence;
pub use single_running::SingleRunning;
pub use switch::Switch;
