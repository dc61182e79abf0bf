//! Decorators that re-run their child.
//!
//! A looping decorator re-enters its child after every completion until its
//! own condition is met. `max_loop_per_frame` caps how often the child may be
//! entered within one tick; values below 1 fail the decorator with ERROR.

use std::any::Any;
use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskCtx};
use crate::core::tree::TaskTree;
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::decorator::{child_or_fail, forward_event};
use crate::error::TaskError;
use crate::status::Status;

fn run_loop<B: 'static>(ctx: &mut TaskCtx<'_, B>, max_loop_per_frame: u32) {
    let Some(child) = child_or_fail(ctx) else {
        return;
    };
    if max_loop_per_frame < 1 {
        ctx.set_failed(Status::ERROR);
        return;
    }
    if max_loop_per_frame == 1 {
        ctx.run_child(child);
        return;
    }
    let rid = ctx.reentry_id();
    for _ in 0..max_loop_per_frame {
        ctx.run_child(child);
        if ctx.check_cancel(rid) {
            return;
        }
        if ctx.status_of(child).is_running() {
            return;
        }
    }
}

/// Which child completions a [`Repeat`] counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    #[default]
    Always,
    OnlySuccess,
    OnlyFailed,
    /// Never counts: repeats until cancelled.
    Never,
}

impl CountMode {
    fn counts(self, status: Status) -> bool {
        match self {
            CountMode::Always => true,
            CountMode::OnlySuccess => status.is_succeeded(),
            CountMode::OnlyFailed => status.is_failed(),
            CountMode::Never => false,
        }
    }
}

/// Re-runs the child until `required` counted completions, then succeeds.
/// A cancelled child cancels the repeat.
#[derive(Debug)]
pub struct Repeat {
    pub required: u32,
    pub count_mode: CountMode,
    pub max_loop_per_frame: u32,
    count: Cell<u32>,
}

impl Repeat {
    pub fn new(required: u32) -> Self {
        Self {
            required,
            count_mode: CountMode::Always,
            max_loop_per_frame: 1,
            count: Cell::new(0),
        }
    }

    pub fn with_count_mode(mut self, count_mode: CountMode) -> Self {
        self.count_mode = count_mode;
        self
    }

    pub fn with_max_loop_per_frame(mut self, max_loop_per_frame: u32) -> Self {
        self.max_loop_per_frame = max_loop_per_frame;
        self
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }
}

impl<B: 'static> Task<B> for Repeat {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.count.set(0);
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if self.required < 1 {
            ctx.set_success();
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        run_loop(ctx, self.max_loop_per_frame);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        if status.is_cancelled() {
            ctx.set_cancelled();
            return;
        }
        if self.count_mode.counts(status) {
            self.count.set(self.count.get() + 1);
            if self.count.get() >= self.required {
                ctx.set_success();
            }
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.count.set(0);
    }
}

/// Re-runs the child until the condition task passes after a completion.
///
/// The condition is separate from the child's guard: it is checked after each
/// run, not before. Without a condition the first completion succeeds.
#[derive(Debug)]
pub struct UntilCond {
    pub max_loop_per_frame: u32,
    cond: Cell<Option<TaskId>>,
}

impl UntilCond {
    pub fn new() -> Self {
        Self {
            max_loop_per_frame: 1,
            cond: Cell::new(None),
        }
    }

    pub fn with_max_loop_per_frame(mut self, max_loop_per_frame: u32) -> Self {
        self.max_loop_per_frame = max_loop_per_frame;
        self
    }

    pub fn cond(&self) -> Option<TaskId> {
        self.cond.get()
    }

    /// Attach `cond` to the `UntilCond` node `until`. The condition becomes
    /// owned by `until` and cannot be attached elsewhere.
    pub fn set_cond<B: 'static>(
        tree: &mut TaskTree<B>,
        until: TaskId,
        cond: TaskId,
    ) -> Result<(), TaskError> {
        let Some(task) = tree.task::<UntilCond>(until) else {
            return Err(TaskError::IllegalState {
                task: until,
                detail: "not an UntilCond".to_string(),
            });
        };
        tree.adopt(until, cond)?;
        task.cond.set(Some(cond));
        Ok(())
    }
}

impl Default for UntilCond {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static> Task<B> for UntilCond {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        run_loop(ctx, self.max_loop_per_frame);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, _child: TaskId) {
        if ctx.check_guard(self.cond.get()) {
            ctx.set_success();
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }

    fn reset_for_restart(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(cond) = self.cond.get() {
            ctx.tree_mut().reset_for_restart(cond);
        }
    }
}

/// Re-runs the child until it fails, then succeeds.
#[derive(Debug)]
pub struct UntilFail {
    pub max_loop_per_frame: u32,
}

impl UntilFail {
    pub fn new() -> Self {
        Self {
            max_loop_per_frame: 1,
        }
    }

    pub fn with_max_loop_per_frame(mut self, max_loop_per_frame: u32) -> Self {
        self.max_loop_per_frame = max_loop_per_frame;
        self
    }
}

impl Default for UntilFail {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static> Task<B> for UntilFail {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        run_loop(ctx, self.max_loop_per_frame);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        if status.is_cancelled() {
            ctx.set_cancelled();
        } else if status.is_failed() {
            ctx.set_success();
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}
