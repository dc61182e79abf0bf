use std::cell::Cell;

use crate::branch::single_running::{SingleRunning, single_running_hooks};
use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ReentryId, TaskId};
use crate::status::Status;

/// Selector needing `required` successes.
///
/// With `fail_fast` it fails as soon as the children left cannot reach
/// `required` any more. A `required` of 0 succeeds immediately.
#[derive(Debug)]
pub struct SelectorN {
    pub required: u32,
    pub fail_fast: bool,
    count: Cell<u32>,
    base: SingleRunning,
}

impl SelectorN {
    pub fn new(required: u32, fail_fast: bool) -> Self {
        Self {
            required,
            fail_fast,
            count: Cell::new(0),
            base: SingleRunning::default(),
        }
    }

    /// Successes counted in the current run.
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    fn check_fail_fast(&self, child_count: usize) -> bool {
        let remaining = child_count as i64 - self.base.completed_count() as i64;
        let missing = i64::from(self.required) - i64::from(self.count.get());
        self.fail_fast && remaining < missing
    }
}

impl Default for SelectorN {
    fn default() -> Self {
        Self::new(1, false)
    }
}

impl<B: 'static> Task<B> for SelectorN {
    single_running_hooks!();

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
        self.count.set(0);
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if self.required < 1 {
            ctx.set_success();
        } else if ctx.child_count() == 0 {
            ctx.set_failed(Status::CHILDLESS);
        } else if self.check_fail_fast(ctx.child_count()) {
            ctx.set_failed(Status::INSUFFICIENT_CHILD);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        self.base.execute(ctx);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        self.base.clear();
        let status = ctx.status_of(child);
        if status.is_cancelled() {
            ctx.set_cancelled();
            return;
        }
        if status.is_succeeded() {
            self.count.set(self.count.get() + 1);
        }
        if status.is_succeeded() && self.count.get() >= self.required {
            ctx.set_success();
        } else if self.base.is_all_child_completed(ctx) || self.check_fail_fast(ctx.child_count()) {
            ctx.set_failed(Status::ERROR);
        } else if !ctx.is_executing() {
            ctx.template_execute();
        }
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
        self.count.set(0);
    }
}
