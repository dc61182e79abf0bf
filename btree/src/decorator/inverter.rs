use std::any::Any;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, TaskId};
use crate::decorator::{child_or_fail, forward_event};
use crate::error::{TaskError, fatal};
use crate::status::Status;

/// Swaps SUCCESS and ERROR. CANCELLED passes through.
///
/// Failure codes are normalized first, so any failure becomes SUCCESS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inverter;

impl<B: 'static> Task<B> for Inverter {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(child) = child_or_fail(ctx) {
            ctx.run_child(child);
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        match ctx.status_of(child).normalize() {
            Status::SUCCESS => ctx.set_failed(Status::ERROR),
            Status::ERROR => ctx.set_success(),
            Status::CANCELLED => ctx.set_cancelled(),
            status => fatal(TaskError::IllegalState {
                task: ctx.id(),
                detail: format!("inverter got non-terminal child status {status}"),
            }),
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}
