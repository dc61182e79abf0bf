//! Decorators forcing a fixed outcome.

use std::any::Any;
use std::cell::Cell;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::decorator::forward_event;
use crate::status::Status;

/// Succeeds once the child completes, whatever its result. Succeeds at once
/// without a child.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSuccess;

impl<B: 'static> Task<B> for AlwaysSuccess {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        match ctx.first_child() {
            Some(child) => ctx.run_child(child),
            None => ctx.set_success(),
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, _child: TaskId) {
        ctx.set_success();
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}

/// Fails once the child completes.
///
/// A failing child keeps its code; any other result becomes ERROR. Without a
/// child the decorator fails with `failure_status`.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysFail {
    pub failure_status: Status,
}

impl AlwaysFail {
    pub fn new(failure_status: Status) -> Self {
        Self { failure_status }
    }
}

impl Default for AlwaysFail {
    fn default() -> Self {
        Self::new(Status::ERROR)
    }
}

impl<B: 'static> Task<B> for AlwaysFail {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        match ctx.first_child() {
            Some(child) => ctx.run_child(child),
            None => ctx.set_failed(self.failure_status.to_failure()),
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child).to_failure();
        ctx.set_completed(status, true);
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}

/// Never completes on its own.
///
/// The child runs at most once per entry. Only a cancelled child is
/// forwarded; every other result is swallowed.
#[derive(Debug, Default)]
pub struct AlwaysRunning {
    child_prev_rid: Cell<Option<ReentryId>>,
}

impl AlwaysRunning {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: 'static> Task<B> for AlwaysRunning {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn before_enter(&self, ctx: &mut TaskCtx<'_, B>) {
        let prev = ctx.first_child().map(|child| ctx.tree().reentry_id(child));
        self.child_prev_rid.set(prev);
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let Some(child) = ctx.first_child() else {
            return;
        };
        let started = self
            .child_prev_rid
            .get()
            .is_some_and(|prev| ctx.tree().is_exited(child, prev));
        if started && ctx.tree().is_completed(child) {
            return;
        }
        ctx.run_child(child);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        if ctx.status_of(child).is_cancelled() {
            ctx.set_cancelled();
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.child_prev_rid.set(None);
    }
}
