use std::any::Any;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, TaskId};
use crate::decorator::{child_or_fail, forward_event};
use crate::status::Status;

/// Re-checks the child's guard on every tick, not only at entry.
///
/// When the guard stops holding the running child is stopped and the
/// decorator fails with ERROR.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCheckGuard;

impl<B: 'static> Task<B> for AlwaysCheckGuard {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let Some(child) = child_or_fail(ctx) else {
            return;
        };
        let guard = ctx.tree().guard(child);
        if ctx.check_guard(guard) {
            ctx.run_child_directly(child);
        } else {
            ctx.stop(child);
            ctx.set_failed(Status::ERROR);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Condition;
    use crate::test_support::{Scripted, entry_with, scripted};

    /// Losing the guard mid-run stops the child.
    #[test]
    fn stops_child_when_guard_fails_later() {
        let (mut entry, _, children) =
            entry_with::<bool, _>(AlwaysCheckGuard, vec![Scripted::running()]);
        *entry.blackboard().borrow_mut() = true;
        let guard = entry.tree_mut().insert(Condition::new(|open: &bool| *open));
        entry
            .tree_mut()
            .set_guard(children[0], Some(guard))
            .expect("guard");

        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::RUNNING);
        *entry.blackboard().borrow_mut() = false;
        assert_eq!(entry.update(3), Status::ERROR);
        assert_eq!(entry.tree().status(children[0]), Status::CANCELLED);
        let child = scripted(entry.tree(), children[0]);
        assert_eq!(child.entries(), 1);
        assert_eq!(child.executions(), 2);
    }

    #[test]
    fn follows_child_result() {
        let (mut entry, _, _) =
            entry_with::<(), _>(AlwaysCheckGuard, vec![Scripted::running_then(Status::TIMEOUT, 1)]);
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::TIMEOUT);
    }
}
