//! Shared state of branches that run one child at a time.

use std::any::Any;
use std::cell::Cell;

use crate::core::task::TaskCtx;
use crate::core::types::TaskId;
use crate::error::{TaskError, fatal};

/// The running child and its index.
///
/// `execute` walks the children in order: it resumes the running child, or
/// picks the next one, and keeps going while children complete synchronously
/// and the owner has not completed. What a completed child means is decided by
/// the owner's `on_child_completed`, which must call [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct SingleRunning {
    running_child: Cell<Option<TaskId>>,
    running_index: Cell<Option<usize>>,
}

impl SingleRunning {
    pub fn running_child(&self) -> Option<TaskId> {
        self.running_child.get()
    }

    /// Index of the child picked last. Stays readable after completion.
    pub fn running_index(&self) -> Option<usize> {
        self.running_index.get()
    }

    /// Children picked so far in this run.
    pub fn completed_count(&self) -> usize {
        self.running_index.get().map_or(0, |index| index + 1)
    }

    pub fn select(&self, index: usize, child: TaskId) {
        self.running_index.set(Some(index));
        self.running_child.set(Some(child));
    }

    pub fn clear(&self) {
        self.running_child.set(None);
    }

    pub fn reset(&self) {
        self.running_child.set(None);
        self.running_index.set(None);
    }

    pub fn is_all_child_completed<B: 'static>(&self, ctx: &TaskCtx<'_, B>) -> bool {
        self.completed_count() >= ctx.child_count()
    }

    pub fn execute<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) {
        let rid = ctx.reentry_id();
        let mut running = self.running_child.get();
        for _ in 0..ctx.child_count() {
            let child = match running.take() {
                Some(child) => child,
                None => self.next_child(ctx),
            };
            ctx.run_child(child);
            if ctx.check_cancel(rid) {
                return;
            }
            if ctx.status_of(child).is_running() {
                return;
            }
        }
        fatal(self.exhausted(ctx));
    }

    fn next_child<B: 'static>(&self, ctx: &TaskCtx<'_, B>) -> TaskId {
        let index = self.completed_count();
        match ctx.child(index) {
            Some(child) => {
                self.select(index, child);
                child
            }
            None => fatal(self.exhausted(ctx)),
        }
    }

    fn exhausted<B: 'static>(&self, ctx: &TaskCtx<'_, B>) -> TaskError {
        TaskError::IllegalState {
            task: ctx.id(),
            detail: format!(
                "no child left to run: children {}, index {:?}",
                ctx.child_count(),
                self.running_index.get()
            ),
        }
    }

    pub fn on_event<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        if let Some(child) = self.running_child.get() {
            ctx.dispatch_event(child, event);
        }
    }

    pub fn stop_running_children<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(child) = self.running_child.get() {
            ctx.stop(child);
        }
    }
}

/// Task hooks every single-running branch shares. The implementing type must
/// have a `base: SingleRunning` field and write `enter`, `execute`,
/// `before_enter`, `reset_for_restart` and `on_child_completed` itself.
macro_rules! single_running_hooks {
    () => {
        fn layout(&self) -> $crate::core::types::ChildLayout {
            $crate::core::types::ChildLayout::Many
        }

        fn exit(&self, _ctx: &mut $crate::core::task::TaskCtx<'_, B>) {
            self.base.clear();
        }

        fn on_child_running(
            &self,
            ctx: &mut $crate::core::task::TaskCtx<'_, B>,
            child: $crate::core::types::TaskId,
        ) {
            if let Some(index) = ctx.tree().index_child(ctx.id(), child) {
                self.base.select(index, child);
            }
        }

        fn on_event(&self, ctx: &mut $crate::core::task::TaskCtx<'_, B>, event: &dyn ::std::any::Any) {
            self.base.on_event(ctx, event);
        }

        fn stop_running_children(&self, ctx: &mut $crate::core::task::TaskCtx<'_, B>) {
            self.base.stop_running_children(ctx);
        }

        fn is_all_child_completed(&self, ctx: &$crate::core::task::TaskCtx<'_, B>) -> bool {
            self.base.is_all_child_completed(ctx)
        }
    };
}

pub(crate) use single_running_hooks;
