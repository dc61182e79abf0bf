//! The capability interface implemented by every node kind.
//!
//! A node kind only supplies behavior. Lifecycle state (status, reentry id,
//! context slots, children) lives in the arena and is driven by the template
//! methods in [`lifecycle`](crate::core::lifecycle). Every hook receives a
//! [`TaskCtx`] naming the node it runs for.
//!
//! Hooks take `&self` because a tick is reentrant: a child completing inside
//! `execute` calls back into `on_child_completed` of the same node before
//! `execute` returns. Node kinds keep per-run data in `Cell`/`RefCell` fields
//! and never hold a borrow across a call back into the tree.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::cancel::CancelToken;
use crate::core::tree::TaskTree;
use crate::core::types::{ChildLayout, ReentryId, TaskFlags, TaskId};
use crate::status::Status;

pub trait Task<B: 'static>: 'static {
    /// How many children this kind holds. Fixed for the lifetime of the node.
    fn layout(&self) -> ChildLayout {
        ChildLayout::Leaf
    }

    /// One-time setup before the task becomes RUNNING. Must not complete it.
    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {}

    /// Runs once on the transition to RUNNING. May complete the task.
    fn enter(&self, _ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {}

    /// The heartbeat. Leaves the task RUNNING or completes it.
    fn execute(&self, ctx: &mut TaskCtx<'_, B>);

    /// Cleanup paired with `enter`. Running children are already stopped.
    fn exit(&self, _ctx: &mut TaskCtx<'_, B>) {}

    fn on_child_running(&self, _ctx: &mut TaskCtx<'_, B>, _child: TaskId) {}

    fn on_child_completed(&self, _ctx: &mut TaskCtx<'_, B>, _child: TaskId) {}

    fn can_handle_event(&self, ctx: &TaskCtx<'_, B>, _event: &dyn Any) -> bool {
        ctx.is_running()
    }

    fn on_event(&self, _ctx: &mut TaskCtx<'_, B>, _event: &dyn Any) {}

    /// Called for auto-listening tasks when their cancel token fires.
    fn on_cancel_requested(&self, ctx: &mut TaskCtx<'_, B>) {
        if ctx.is_running() {
            ctx.set_cancelled();
        }
    }

    /// Clear kind-specific data. The kernel has already reset the node itself.
    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {}

    /// Stop every running child, last child first.
    fn stop_running_children(&self, ctx: &mut TaskCtx<'_, B>) {
        for child in ctx.children().into_iter().rev() {
            if ctx.tree().is_running(child) {
                ctx.tree_mut().stop(child);
            }
        }
    }

    /// Reset every child that has run, last child first.
    fn reset_children_for_restart(&self, ctx: &mut TaskCtx<'_, B>) {
        for child in ctx.children().into_iter().rev() {
            if ctx.tree().status(child) != Status::NEW {
                ctx.tree_mut().reset_for_restart(child);
            }
        }
    }

    /// True iff no child is running. Kinds that count completions override this.
    fn is_all_child_completed(&self, ctx: &TaskCtx<'_, B>) -> bool {
        ctx.children()
            .into_iter()
            .all(|child| !ctx.tree().is_running(child))
    }

    /// Short name used in diagnostics.
    fn kind(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// A node's view of the tree while one of its hooks runs.
pub struct TaskCtx<'a, B: 'static> {
    tree: &'a mut TaskTree<B>,
    id: TaskId,
}

impl<'a, B: 'static> TaskCtx<'a, B> {
    pub(crate) fn new(tree: &'a mut TaskTree<B>, id: TaskId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn tree(&self) -> &TaskTree<B> {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TaskTree<B> {
        &mut *self.tree
    }

    pub fn status(&self) -> Status {
        self.tree.status(self.id)
    }

    pub fn status_of(&self, task: TaskId) -> Status {
        self.tree.status(task)
    }

    pub fn is_running(&self) -> bool {
        self.tree.is_running(self.id)
    }

    pub fn is_executing(&self) -> bool {
        self.tree.is_executing(self.id)
    }

    pub fn reentry_id(&self) -> ReentryId {
        self.tree.reentry_id(self.id)
    }

    pub fn is_exited(&self, rid: ReentryId) -> bool {
        self.tree.is_exited(self.id, rid)
    }

    pub fn prev_status(&self) -> Status {
        self.tree.prev_status(self.id)
    }

    pub fn cur_frame(&self) -> u32 {
        self.tree.cur_frame()
    }

    pub fn run_frames(&self) -> u32 {
        self.tree.run_frames(self.id)
    }

    pub fn options(&self) -> TaskFlags {
        self.tree.options(self.id)
    }

    pub fn control(&self) -> Option<TaskId> {
        self.tree.control(self.id)
    }

    pub fn guard(&self) -> Option<TaskId> {
        self.tree.guard(self.id)
    }

    pub fn blackboard(&self) -> Option<Rc<RefCell<B>>> {
        self.tree.blackboard(self.id)
    }

    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.tree.cancel_token(self.id)
    }

    /// Shared read-only props, if present and of type `T`.
    pub fn shared_props<T: 'static>(&self) -> Option<Rc<T>> {
        self.tree
            .shared_props(self.id)
            .and_then(|props| props.downcast::<T>().ok())
    }

    pub fn children(&self) -> Vec<TaskId> {
        self.tree.children(self.id).to_vec()
    }

    pub fn child_count(&self) -> usize {
        self.tree.child_count(self.id)
    }

    pub fn child(&self, index: usize) -> Option<TaskId> {
        self.tree.child(self.id, index)
    }

    pub fn first_child(&self) -> Option<TaskId> {
        self.child(0)
    }

    pub fn is_first_child(&self, child: TaskId) -> bool {
        self.first_child() == Some(child)
    }

    pub fn set_success(&mut self) {
        self.tree.set_success(self.id);
    }

    pub fn set_failed(&mut self, code: Status) {
        self.tree.set_failed(self.id, code);
    }

    pub fn set_cancelled(&mut self) {
        self.tree.set_cancelled(self.id);
    }

    pub fn set_completed(&mut self, status: Status, from_child: bool) {
        self.tree.set_completed(self.id, status, from_child);
    }

    /// Re-tick this task through the template (cancel checks and notification).
    pub fn template_execute(&mut self) {
        self.tree.template_execute(self.id);
    }

    pub fn run_child(&mut self, child: TaskId) {
        self.tree.run_child(self.id, child);
    }

    pub fn run_child_directly(&mut self, child: TaskId) {
        self.tree.run_child_directly(self.id, child);
    }

    pub fn run_hook(&mut self, child: TaskId) {
        self.tree.run_hook(self.id, child);
    }

    pub fn run_hook_directly(&mut self, child: TaskId) {
        self.tree.run_hook_directly(self.id, child);
    }

    /// Check a guard with this task as its control. `None` passes.
    pub fn check_guard(&mut self, guard: Option<TaskId>) -> bool {
        self.tree.check_guard(self.id, guard)
    }

    /// True if the run identified by `rid` is over, cancelling it first if its
    /// token is cancelling. Call inside custom loops in `execute`.
    pub fn check_cancel(&mut self, rid: ReentryId) -> bool {
        self.tree.check_cancel(self.id, rid)
    }

    pub fn stop(&mut self, task: TaskId) {
        self.tree.stop(task);
    }

    pub fn set_guard_failed(&mut self, task: TaskId, control: Option<TaskId>) {
        self.tree.set_guard_failed(task, control);
    }

    pub fn dispatch_event(&mut self, task: TaskId, event: &dyn Any) {
        self.tree.dispatch_event(task, event);
    }
}
