//! The task execution kernel.
//!
//! Node kinds (composites, decorators, leaves, the state machine) are built
//! purely on the contract exposed here: the [`Task`](task::Task) trait, the
//! [`TaskTree`](tree::TaskTree) arena and the template methods in
//! [`lifecycle`].

pub mod lifecycle;
pub mod task;
pub mod tree;
pub mod types;

pub use task::{Task, TaskCtx};
pub use tree::TaskTree;
pub use types::{ChildLayout, ContextSlot, ReentryId, TaskFlags, TaskId};
