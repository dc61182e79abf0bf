use crate::branch::single_running::{SingleRunning, single_running_hooks};
use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ReentryId, TaskId};
use crate::status::Status;

/// Re-evaluates every guard each tick and runs the first child that passes.
///
/// When the winner changes, the previously running child is stopped without
/// notification. The running child's result is returned as is.
#[derive(Debug, Default)]
pub struct ActiveSelector {
    base: SingleRunning,
}

impl ActiveSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running_child(&self) -> Option<TaskId> {
        self.base.running_child()
    }
}

impl<B: 'static> Task<B> for ActiveSelector {
    single_running_hooks!();

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.base.reset();
    }

    fn enter(&self, _ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {}

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let running = self.base.running_child();
        let mut selected = None;
        for (index, child) in ctx.children().into_iter().enumerate() {
            let guard = ctx.tree().guard(child);
            if !ctx.check_guard(guard) {
                // The running child is stopped below instead.
                if Some(child) != running {
                    ctx.set_guard_failed(child, None);
                }
                continue;
            }
            selected = Some((index, child));
            break;
        }

        if let Some(running) = running {
            if selected.map(|(_, child)| child) != Some(running) {
                ctx.stop(running);
                self.base.reset();
            }
        }
        let Some((index, child)) = selected else {
            ctx.set_failed(Status::ERROR);
            return;
        };
        self.base.select(index, child);
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
