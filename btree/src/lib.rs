//! Task-tree execution kernel.
//!
//! A tree of tasks (behavior-tree nodes, state machines and parallel joins) is
//! advanced one frame at a time by a driving loop. The crate is split the same
//! way as the runtime it models:
//!
//! - **[`core`]**: the arena ([`core::TaskTree`]), the [`core::Task`] trait and
//!   the template methods that every status change goes through. No node kinds.
//! - **Node libraries**: [`branch`] (sequences, selectors, parallels, joins),
//!   [`decorator`] (single-child transforms), [`leaf`] (structural leaves) and
//!   [`fsm`] (state machines).
//! - **[`entry`]**: [`entry::TaskEntry`], the root that owns the blackboard,
//!   the root cancel token and the frame counter.
//!
//! Execution is single-threaded and synchronous. Tree outcomes are
//! [`status::Status`] values; only structural misuse returns
//! [`error::TaskError`].

pub mod branch;
pub mod cancel;
pub mod core;
pub mod decorator;
pub mod demo;
pub mod entry;
pub mod error;
pub mod exit_codes;
pub mod fsm;
pub mod io;
pub mod leaf;
pub mod loader;
pub mod logging;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
