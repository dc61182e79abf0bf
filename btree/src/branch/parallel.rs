//! Branches that advance several children in the same tick.
//!
//! The first child is the primary: its result is the branch's result and
//! events go only to it. Parallel branches ignore `on_child_running`; their
//! state is settled at the end of `execute`.

use std::any::Any;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::status::Status;

fn forward_to_primary<B: 'static>(ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
    if let Some(primary) = ctx.first_child() {
        ctx.dispatch_event(primary, event);
    }
}

/// Ticks every child each cycle and completes with the primary's status.
///
/// Secondary children run as hooks. Once the branch completes or is cancelled
/// the rest of the tick is skipped.
#[derive(Debug, Default)]
pub struct SimpleParallel;

impl SimpleParallel {
    pub fn new() -> Self {
        Self
    }
}

impl<B: 'static> Task<B> for SimpleParallel {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Many
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if ctx.child_count() == 0 {
            ctx.set_failed(Status::CHILDLESS);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let rid = ctx.reentry_id();
        let children = ctx.children();
        let Some((&primary, secondaries)) = children.split_first() else {
            return;
        };
        ctx.run_child(primary);
        if ctx.check_cancel(rid) {
            return;
        }
        for &child in secondaries {
            ctx.run_hook(child);
            if ctx.check_cancel(rid) {
                return;
            }
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        debug_assert!(ctx.is_first_child(child), "only the primary notifies");
        let status = ctx.status_of(child);
        ctx.set_completed(status, true);
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_to_primary(ctx, event);
    }
}

/// Primary plus background services.
///
/// Every child is ticked each cycle, the services as hooks and regardless of
/// what the primary did. The branch completes with the primary's status at the
/// end of the tick in which the primary completed. A primary completing
/// outside the tick (from an event) makes the branch succeed.
///
/// Once the branch itself has exited during a tick (cancelled while the
/// primary ran), the remaining services are not ticked.
#[derive(Debug, Default)]
pub struct ServiceParallel;

impl ServiceParallel {
    pub fn new() -> Self {
        Self
    }
}

impl<B: 'static> Task<B> for ServiceParallel {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Many
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if ctx.child_count() == 0 {
            ctx.set_failed(Status::CHILDLESS);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let rid = ctx.reentry_id();
        let children = ctx.children();
        let Some((&primary, services)) = children.split_first() else {
            return;
        };
        ctx.run_child(primary);
        for &child in services {
            if ctx.is_exited(rid) {
                return;
            }
            ctx.run_hook(child);
        }
        if !ctx.is_exited(rid) && ctx.status_of(primary).is_completed() {
            let status = ctx.status_of(primary);
            ctx.set_completed(status, true);
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        debug_assert!(ctx.is_first_child(child), "only the primary notifies");
        if !ctx.is_executing() && ctx.is_running() {
            ctx.set_success();
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_to_primary(ctx, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TaskEntry;
    use crate::test_support::{Scripted, entry_with, scripted};

    /// Cancels the token it inherited while executing.
    struct CancelsOwnToken;

    impl Task<()> for CancelsOwnToken {
        fn execute(&self, ctx: &mut TaskCtx<'_, ()>) {
            if let Some(token) = ctx.cancel_token() {
                ctx.tree_mut().cancel(&token, 1);
            }
        }
    }

    /// Secondary children run every tick but only the primary decides.
    #[test]
    fn simple_parallel_follows_primary() {
        let (mut entry, _, children) = entry_with::<(), _>(
            SimpleParallel::new(),
            vec![Scripted::running_then(Status::ERROR, 2), Scripted::running()],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::RUNNING);
        assert_eq!(scripted(entry.tree(), children[1]).executions(), 2);
        assert_eq!(entry.update(3), Status::ERROR);
        assert_eq!(entry.tree().status(children[1]), Status::CANCELLED);
    }

    /// Once the primary completes, later children are skipped for that tick.
    #[test]
    fn simple_parallel_skips_rest_after_completion() {
        let (mut entry, _, children) =
            entry_with::<(), _>(SimpleParallel::new(), vec![Scripted::succeed(), Scripted::running()]);
        assert_eq!(entry.update(1), Status::SUCCESS);
        assert_eq!(scripted(entry.tree(), children[1]).entries(), 0);
    }

    #[test]
    fn parallel_without_children_is_childless() {
        let (mut entry, _, _) = entry_with::<(), _>(SimpleParallel::new(), Vec::new());
        assert_eq!(entry.update(1), Status::CHILDLESS);
        let (mut entry, _, _) = entry_with::<(), _>(ServiceParallel::new(), Vec::new());
        assert_eq!(entry.update(1), Status::CHILDLESS);
    }

    /// Services still tick in the frame the primary completes.
    #[test]
    fn service_parallel_ticks_services_before_completing() {
        let (mut entry, _, children) = entry_with::<(), _>(
            ServiceParallel::new(),
            vec![Scripted::running_then(Status::TIMEOUT, 1), Scripted::running()],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::TIMEOUT);
        assert_eq!(scripted(entry.tree(), children[1]).executions(), 2);
    }

    /// Completed services are restarted on the next tick.
    #[test]
    fn service_parallel_restarts_finished_services() {
        let (mut entry, _, children) = entry_with::<(), _>(
            ServiceParallel::new(),
            vec![Scripted::running(), Scripted::succeed()],
        );
        entry.update(1);
        entry.update(2);
        entry.update(3);
        assert_eq!(scripted(entry.tree(), children[1]).entries(), 3);
    }

    #[test]
    fn service_parallel_succeeds_when_primary_completes_from_event() {
        let (mut entry, _, _) = entry_with::<(), _>(
            ServiceParallel::new(),
            vec![Scripted::running().completing_on_event(Status::ERROR), Scripted::running()],
        );
        entry.update(1);
        entry.on_event(&1u8);
        assert_eq!(entry.status(), Status::SUCCESS);
    }

    /// A branch cancelled while its primary runs ticks no services that frame.
    #[test]
    fn service_parallel_stops_ticking_once_exited() {
        let mut entry = TaskEntry::new(());
        let tree = entry.tree_mut();
        let root = tree.insert(ServiceParallel::new());
        let primary = tree.insert(CancelsOwnToken);
        let service = tree.insert(Scripted::running());
        tree.add_children(root, [primary, service]).expect("children");
        tree.flags_mut(root).auto_listen_cancel = true;
        entry.set_root(root).expect("root");

        assert_eq!(entry.update(1), Status::CANCELLED);
        assert_eq!(entry.tree().status(primary), Status::CANCELLED);
        assert_eq!(scripted(entry.tree(), service).entries(), 0);
    }
}
