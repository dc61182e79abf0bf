use std::any::Any;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::decorator::{child_or_fail, forward_event};

/// Runs the child once. Later entries complete at once with the child's
/// recorded result until the decorator is reset for restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyOnce;

impl<B: 'static> Task<B> for OnlyOnce {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        let Some(child) = ctx.first_child() else {
            return;
        };
        let status = ctx.status_of(child);
        if status.is_completed() {
            ctx.set_completed(status, true);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(child) = child_or_fail(ctx) {
            ctx.run_child(child);
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        ctx.set_completed(status, true);
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}
