use crate::branch::single_running::{SingleRunning, single_running_hooks};
use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ReentryId, TaskId};

/// Runs children in order until one fails.
///
/// A failing child's code becomes the sequence's code. No children at all
/// counts as success.
#[derive(Debug, Default)]
pub struct Sequence {
    base: SingleRunning,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_index(&self) -> Option<usize> {
        self.base.running_index()
    }
}

impl<B: 'static> Task<B> for Sequence {
    single_running_hooks!();

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if ctx.child_count() == 0 {
            ctx.set_success();
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
        } else if status.is_failed() {
            ctx.set_completed(status, true);
        } else if self.base.is_all_child_completed(ctx) {
            ctx.set_success();
        } else if !ctx.is_executing() {
            ctx.template_execute();
        }
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
    }
}
