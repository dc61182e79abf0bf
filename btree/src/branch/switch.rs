use crate::branch::single_running::{SingleRunning, single_running_hooks};
use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ReentryId, TaskId};
use crate::status::Status;

/// Picks the first child whose guard passes and runs it to completion.
///
/// The child's status is returned as is. ERROR when no guard passes.
#[derive(Debug, Default)]
pub struct Switch {
    base: SingleRunning,
}

impl Switch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_index(&self) -> Option<usize> {
        self.base.running_index()
    }

    fn select_child<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) -> Option<TaskId> {
        for (index, child) in ctx.children().into_iter().enumerate() {
            let guard = ctx.tree().guard(child);
            if !ctx.check_guard(guard) {
                // Skipped candidates never notify.
                ctx.set_guard_failed(child, None);
                continue;
            }
            self.base.select(index, child);
            return Some(child);
        }
        None
    }
}

impl<B: 'static> Task<B> for Switch {
    single_running_hooks!();

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
    }

    fn enter(&self, _ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {}

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let child = match self.base.running_child() {
            Some(child) => child,
            None => match self.select_child(ctx) {
                Some(child) => child,
                None => {
                    ctx.set_failed(Status::ERROR);
                    return;
                }
            },
        };
        ctx.run_child_directly(child);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        self.base.clear();
        let status = ctx.status_of(child);
        ctx.set_completed(status, true);
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
    }
}
