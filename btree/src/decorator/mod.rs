//! Decorators: tasks with at most one child that transform its run or result.

mod always;
mod check_guard;
mod inverter;
mod looping;
mod once;
mod subtree;

pub use always::{AlwaysFail, AlwaysRunning, AlwaysSuccess};
pub use check_guard::AlwaysCheckGuard;
pub use inverter::Inverter;
pub use looping::{CountMode, Repeat, UntilCond, UntilFail};
pub use once::OnlyOnce;
pub use subtree::SubtreeRef;

use std::any::Any;

use crate::core::task::TaskCtx;
use crate::core::types::TaskId;
use crate::status::Status;

/// The child, or `None` after failing the decorator with CHILDLESS.
pub(crate) fn child_or_fail<B: 'static>(ctx: &mut TaskCtx<'_, B>) -> Option<TaskId> {
    let child = ctx.first_child();
    if child.is_none() {
        ctx.set_failed(Status::CHILDLESS);
    }
    child
}

pub(crate) fn forward_event<B: 'static>(ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
    if let Some(child) = ctx.first_child() {
        ctx.dispatch_event(child, event);
    }
}
