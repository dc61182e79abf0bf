//! Template methods: the enter/execute/exit protocol.
//!
//! Every state change of a task goes through these methods. They keep three
//! things consistent across reentrant calls:
//!
//! - **Reentry id.** Bumped once at entry and once at exit. A caller that saved
//!   the id before running arbitrary code compares it afterwards to learn
//!   whether the run it started is still live.
//! - **Notification.** A task completing inside its own `execute` does not
//!   notify its control right away. The template that called `execute` does it
//!   on the way out ("delayed notify"). A task completing anywhere else (an
//!   event, a cancel listener, a sibling) notifies immediately. Stopped tasks
//!   and hooks never notify.
//! - **Context.** Blackboard, cancel token and shared props are captured from
//!   the control at entry when unset, and released at exit.

use std::any::Any;

use tracing::{debug, trace};

use crate::core::task::{Task, TaskCtx};
use crate::core::tree::TaskTree;
use crate::core::types::{Children, ContextSlot, ReentryId, RunFlags, TaskId};
use crate::error::{TaskError, fatal};
use crate::status::Status;

impl<B: 'static> TaskTree<B> {
    /// Run `f` with the node kind of `id` and a context for it.
    pub(crate) fn call<R>(
        &mut self,
        id: TaskId,
        f: impl FnOnce(&dyn Task<B>, &mut TaskCtx<'_, B>) -> R,
    ) -> R {
        let task = self.behavior(id);
        let mut ctx = TaskCtx::new(self, id);
        f(&*task, &mut ctx)
    }

    // ---- notification masks ----

    fn check_notify(&self, id: TaskId) -> bool {
        let run = self.node(id).run;
        !run.disable_notify && !run.stop_exit
    }

    fn check_delay_notify(&self, id: TaskId) -> bool {
        self.check_notify(id) && !self.node(id).options.disable_delay_notify
    }

    fn check_immediate_notify(&self, id: TaskId) -> bool {
        let node = self.node(id);
        self.check_notify(id) && (node.options.disable_delay_notify || !node.run.executing)
    }

    fn auto_check_cancel(&self, id: TaskId) -> bool {
        !self.node(id).options.disable_auto_check_cancel
    }

    pub fn is_cancelling(&self, id: TaskId) -> bool {
        self.node(id)
            .cancel_token
            .get()
            .is_some_and(|token| token.is_cancelling())
    }

    fn notify_completed(&mut self, control: TaskId, child: TaskId) {
        self.node_mut(child).run.notified = true;
        self.ensure_branch(control);
        trace!(task = %control, child = %child, status = %self.status(child), "child completed");
        self.call(control, |task, ctx| task.on_child_completed(ctx, child));
    }

    fn notify_running(&mut self, control: TaskId, child: TaskId) {
        self.ensure_branch(control);
        self.call(control, |task, ctx| task.on_child_running(ctx, child));
    }

    fn ensure_branch(&self, control: TaskId) {
        if matches!(self.node(control).children, Children::Leaf) {
            fatal(TaskError::IllegalState {
                task: control,
                detail: "leaf task received a child notification".to_string(),
            });
        }
    }

    /// Delayed notify after the task exited while its template was on the stack.
    fn notify_after_exit(&mut self, id: TaskId, rid: ReentryId) {
        if self.node(id).reentry == rid.next() && self.check_delay_notify(id) {
            if let Some(control) = self.node(id).control {
                self.notify_completed(control, id);
            }
        }
    }

    /// Post-execute check for a task that is still running.
    fn check_fire_running_and_cancel(&mut self, id: TaskId) {
        if self.auto_check_cancel(id) && self.is_cancelling(id) {
            self.node_mut(id).options.disable_delay_notify = true;
            self.set_cancelled(id);
            return;
        }
        if self.check_notify(id) {
            if let Some(control) = self.node(id).control {
                self.notify_running(control, id);
            }
        }
    }

    // ---- context ----

    /// Fill unset context slots from `control` and link it as the control.
    pub(crate) fn capture_context(&mut self, id: TaskId, control: TaskId) {
        let (blackboard, token, props) = {
            let c = self.node(control);
            (
                c.blackboard.get().cloned(),
                c.cancel_token.get().cloned(),
                c.shared_props.get().cloned(),
            )
        };
        let node = self.node_mut(id);
        node.control = Some(control);
        if node.blackboard.is_empty() {
            match blackboard {
                Some(bb) => node.blackboard = ContextSlot::Inherited(bb),
                None => fatal(TaskError::MissingContext {
                    task: control,
                    slot: "blackboard",
                }),
            }
        }
        if node.cancel_token.is_empty() {
            match token {
                Some(token) => node.cancel_token = ContextSlot::Inherited(token),
                None => fatal(TaskError::MissingContext {
                    task: control,
                    slot: "cancel token",
                }),
            }
        }
        if node.shared_props.is_empty() {
            if let Some(props) = props {
                node.shared_props = ContextSlot::Inherited(props);
            }
        }
    }

    pub(crate) fn release_context(&mut self, id: TaskId) {
        let node = self.node_mut(id);
        node.blackboard.release();
        node.cancel_token.release();
        node.shared_props.release();
    }

    // ---- entry / tick / exit ----

    /// Enter a task that is not running and run its first tick.
    ///
    /// `control` is `None` only for the entry. A hook (`as_hook`) never
    /// notifies its control.
    pub fn template_enter_execute(&mut self, id: TaskId, control: Option<TaskId>, as_hook: bool) {
        if self.is_running(id) {
            fatal(TaskError::IllegalState {
                task: id,
                detail: "entering a task that is already running".to_string(),
            });
        }
        {
            let node = self.node_mut(id);
            node.run = RunFlags {
                disable_notify: as_hook,
                ..RunFlags::default()
            };
            node.options = node.flags;
        }
        if let Some(control) = control {
            self.capture_context(id, control);
        }

        if self.auto_check_cancel(id) && self.is_cancelling(id) {
            debug!(task = %id, "stillborn: cancel token already cancelling");
            self.release_context(id);
            self.set_completed(id, Status::CANCELLED, false);
            return;
        }

        let frame = self.frame;
        let (rid, prev_status) = {
            let node = self.node_mut(id);
            let prev = node.status;
            node.prev_status = prev.clamp_prev();
            node.run.enter_execute = true;
            node.run.executing = true;
            node.status = Status::RUNNING;
            node.enter_frame = frame;
            node.exit_frame = frame;
            node.reentry = node.reentry.next();
            (node.reentry, prev)
        };
        trace!(task = %id, kind = self.kind(id), rid = rid.value(), "enter");

        self.enter_execute_body(id, rid, prev_status);

        let node = self.node_mut(id);
        if node.reentry == rid || node.reentry == rid.next() {
            node.run.enter_execute = false;
            node.run.executing = false;
        }
    }

    fn enter_execute_body(&mut self, id: TaskId, rid: ReentryId, prev_status: Status) {
        if prev_status != Status::NEW && self.node(id).options.auto_reset_children {
            self.call(id, |task, ctx| task.reset_children_for_restart(ctx));
        }
        self.call(id, |task, ctx| task.before_enter(ctx));
        self.call(id, |task, ctx| task.enter(ctx, rid));
        if self.is_exited(id, rid) {
            self.notify_after_exit(id, rid);
            return;
        }
        if self.auto_check_cancel(id) && self.is_cancelling(id) {
            self.node_mut(id).options.disable_delay_notify = true;
            self.set_cancelled(id);
            return;
        }
        if self.node(id).options.slow_start {
            self.check_fire_running_and_cancel(id);
            return;
        }
        if self.node(id).options.auto_listen_cancel {
            if let Some(token) = self.cancel_token(id) {
                token.register_task(id, &self.cancel_inbox);
            }
        }

        self.call(id, |task, ctx| task.execute(ctx));
        if self.is_exited(id, rid) {
            self.notify_after_exit(id, rid);
        } else {
            self.check_fire_running_and_cancel(id);
        }
    }

    /// Tick a task that is already running.
    pub fn template_execute(&mut self, id: TaskId) {
        debug_assert!(self.is_running(id), "template_execute on a task that is not running");
        let rid = self.node(id).reentry;
        let auto_check = self.auto_check_cancel(id);
        if auto_check && self.is_cancelling(id) {
            self.node_mut(id).options.disable_delay_notify = true;
            self.set_cancelled(id);
            return;
        }
        self.node_mut(id).run.executing = true;

        self.call(id, |task, ctx| task.execute(ctx));

        let node = self.node_mut(id);
        if node.reentry == rid || node.reentry == rid.next() {
            node.run.executing = false;
        }
        if self.is_exited(id, rid) {
            self.notify_after_exit(id, rid);
        } else if auto_check && self.is_cancelling(id) {
            self.node_mut(id).options.disable_delay_notify = true;
            self.set_cancelled(id);
        }
    }

    /// Exit a task whose status has just left RUNNING.
    fn template_exit(&mut self, id: TaskId, stop_exit: bool) {
        let frame = self.frame;
        {
            let node = self.node_mut(id);
            node.run.stop_exit |= stop_exit;
            node.exit_frame = frame;
        }
        if self.node(id).options.auto_listen_cancel {
            if let Some(token) = self.cancel_token(id) {
                token.unregister_task(id);
            }
        }
        self.call(id, |task, ctx| task.stop_running_children(ctx));
        self.call(id, |task, ctx| task.exit(ctx));

        let node = self.node_mut(id);
        node.reentry = node.reentry.next();
        self.release_context(id);
        trace!(task = %id, status = %self.status(id), stop_exit, "exit");
    }

    // ---- completion ----

    /// Complete with `status`.
    ///
    /// `from_child` marks a status copied from a child, which turns
    /// `GUARD_FAILED` into `ERROR`. A task that was not running skips the exit
    /// path and becomes stillborn.
    pub fn set_completed(&mut self, id: TaskId, status: Status, from_child: bool) {
        if !status.is_completed() {
            fatal(TaskError::IllegalState {
                task: id,
                detail: format!("completion status must be terminal, got {status}"),
            });
        }
        let status = if from_child && status == Status::GUARD_FAILED {
            Status::ERROR
        } else {
            status
        };

        if self.is_running(id) {
            if status == Status::GUARD_FAILED {
                fatal(TaskError::IllegalState {
                    task: id,
                    detail: "a running task cannot fail its guard".to_string(),
                });
            }
            self.node_mut(id).status = status;
            self.template_exit(id, false);
        } else {
            let frame = self.frame;
            let node = self.node_mut(id);
            node.prev_status = node.status.clamp_prev();
            node.enter_frame = frame;
            node.exit_frame = frame;
            node.reentry = node.reentry.next();
            node.run.stillborn = true;
            node.status = status;
            debug!(task = %id, status = %status, "completed without running");
        }

        if self.check_immediate_notify(id) {
            if let Some(control) = self.node(id).control {
                self.notify_completed(control, id);
            }
        }
    }

    pub fn set_success(&mut self, id: TaskId) {
        debug_assert!(self.is_running(id), "set_success on a task that is not running");
        self.set_completed(id, Status::SUCCESS, false);
    }

    /// Fail with `code`, which must be a failure code (`>= ERROR`).
    pub fn set_failed(&mut self, id: TaskId, code: Status) {
        if code < Status::ERROR {
            fatal(TaskError::IllegalState {
                task: id,
                detail: format!("failure code must be >= ERROR, got {code}"),
            });
        }
        self.set_completed(id, code, false);
    }

    pub fn set_cancelled(&mut self, id: TaskId) {
        self.set_completed(id, Status::CANCELLED, false);
    }

    /// Mark a task that was never entered as guard-failed.
    ///
    /// With a control the control is notified; with `None` nobody is.
    pub fn set_guard_failed(&mut self, id: TaskId, control: Option<TaskId>) {
        self.guard_fail(id, control, control.is_some());
    }

    fn guard_fail(&mut self, id: TaskId, control: Option<TaskId>, notify: bool) {
        debug_assert!(!self.is_running(id), "guard failure on a running task");
        let node = self.node_mut(id);
        node.run = RunFlags {
            disable_notify: !notify,
            ..RunFlags::default()
        };
        if let Some(control) = control {
            node.control = Some(control);
        }
        debug!(task = %id, "guard failed");
        self.set_completed(id, Status::GUARD_FAILED, false);
    }

    /// Cancel a running task without notifying its control.
    ///
    /// On a completed task this only records that no notification is due.
    pub fn stop(&mut self, id: TaskId) {
        if self.is_running(id) {
            self.node_mut(id).status = Status::CANCELLED;
            self.template_exit(id, true);
        } else if self.status(id) != Status::NEW {
            self.node_mut(id).run.stop_exit = true;
        }
    }

    /// Return a task (and its subtree) to NEW so it can be entered again.
    ///
    /// Only the reentry id moves forward; `prev_status` keeps the status the
    /// task had before the reset.
    pub fn reset_for_restart(&mut self, id: TaskId) {
        if self.status(id) == Status::NEW {
            return;
        }
        if self.is_running(id) {
            self.stop(id);
        }
        self.call(id, |task, ctx| task.reset_children_for_restart(ctx));
        if let Some(guard) = self.guard(id) {
            self.reset_for_restart(guard);
        }
        if self.entry != Some(id) {
            self.unset_control(id);
        }
        {
            let node = self.node_mut(id);
            node.prev_status = node.status.clamp_prev();
            node.status = Status::NEW;
            node.run = RunFlags::default();
            node.options = node.flags;
            node.enter_frame = 0;
            node.exit_frame = 0;
            node.reentry = node.reentry.next();
        }
        self.call(id, |task, ctx| task.reset_for_restart(ctx));
        trace!(task = %id, "reset for restart");
    }

    /// True if the run `rid` of `id` is over, cancelling it first when its
    /// token is cancelling.
    pub fn check_cancel(&mut self, id: TaskId, rid: ReentryId) -> bool {
        if self.is_exited(id, rid) {
            return true;
        }
        if self.is_cancelling(id) {
            self.set_cancelled(id);
            return true;
        }
        false
    }

    // ---- running children ----

    /// Resume a running child, or check its guard and enter it.
    pub fn run_child(&mut self, control: TaskId, child: TaskId) {
        if self.is_running(child) {
            self.template_execute(child);
        } else if self.check_guard(control, self.guard(child)) {
            self.template_enter_execute(child, Some(control), false);
        } else {
            self.guard_fail(child, Some(control), true);
        }
    }

    /// Like [`run_child`](Self::run_child) without the guard check.
    pub fn run_child_directly(&mut self, control: TaskId, child: TaskId) {
        if self.is_running(child) {
            self.template_execute(child);
        } else {
            self.template_enter_execute(child, Some(control), false);
        }
    }

    /// Run a child whose completion is not reported to `control`.
    pub fn run_hook(&mut self, control: TaskId, child: TaskId) {
        if self.is_running(child) {
            self.template_execute(child);
        } else if self.check_guard(control, self.guard(child)) {
            self.template_enter_execute(child, Some(control), true);
        } else {
            self.guard_fail(child, Some(control), false);
        }
    }

    pub fn run_hook_directly(&mut self, control: TaskId, child: TaskId) {
        if self.is_running(child) {
            self.template_execute(child);
        } else {
            self.template_enter_execute(child, Some(control), true);
        }
    }

    /// Evaluate `guard` under `control`. `None` passes.
    ///
    /// The guard is entered and must resolve to SUCCESS or ERROR in that one
    /// step. It is detached again afterwards.
    pub fn check_guard(&mut self, control: TaskId, guard: Option<TaskId>) -> bool {
        let Some(guard) = guard else {
            return true;
        };
        let passed = self.evaluate_guard(control, guard);
        self.unset_control(guard);
        passed
    }

    fn evaluate_guard(&mut self, control: TaskId, guard: TaskId) -> bool {
        // A guard's own guard is checked against the same control.
        let inner = self.guard(guard);
        if inner.is_some() && !self.check_guard(control, inner) {
            return false;
        }
        self.template_enter_execute(guard, Some(control), true);
        match self.status(guard).normalize() {
            Status::SUCCESS => true,
            Status::ERROR => false,
            status => fatal(TaskError::IllegalGuardStatus { guard, status }),
        }
    }

    // ---- events and cancellation ----

    /// Deliver `event` to `id` if it accepts it.
    pub fn dispatch_event(&mut self, id: TaskId, event: &dyn Any) {
        let task = self.behavior(id);
        let accepted = {
            let ctx = TaskCtx::new(self, id);
            task.can_handle_event(&ctx, event)
        };
        if accepted {
            self.call(id, |task, ctx| task.on_event(ctx, event));
        }
    }

    /// Cancel `token` and immediately deliver the request to auto-listening
    /// tasks of this tree.
    pub fn cancel(&mut self, token: &crate::cancel::CancelToken, code: i32) {
        token.cancel(code);
        self.drain_cancel_inbox();
    }

    /// Deliver queued cancel requests to auto-listening tasks.
    pub fn drain_cancel_inbox(&mut self) {
        loop {
            let next = self.cancel_inbox.borrow_mut().pop_front();
            let Some(id) = next else {
                break;
            };
            if self.is_running(id) {
                debug!(task = %id, "cancel requested");
                self.call(id, |task, ctx| task.on_cancel_requested(ctx));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::cancel::CancelToken;
    use crate::core::types::ChildLayout;
    use crate::leaf::{Condition, Success};
    use crate::test_support::{Probe, Scripted, root_context};

    /// Root-like setup: a probe branch owning context, plus children.
    fn probe_tree(children: Vec<Scripted>) -> (TaskTree<()>, TaskId, Vec<TaskId>) {
        let mut tree = TaskTree::new();
        let probe = tree.insert(Probe::new());
        root_context(&mut tree, probe);
        let ids = children
            .into_iter()
            .map(|child| {
                let id = tree.insert(child);
                tree.add_child(probe, id).expect("add child");
                id
            })
            .collect();
        (tree, probe, ids)
    }

    /// A child completing inside its first tick notifies once, after execute.
    #[test]
    fn synchronous_completion_notifies_once() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        tree.template_enter_execute(probe, None, false);

        let child = ids[0];
        assert_eq!(tree.status(child), Status::SUCCESS);
        assert!(tree.is_notified(child));
        let probe_task = tree.task::<Probe>(probe).expect("probe");
        assert_eq!(probe_task.completed(), vec![(child, Status::SUCCESS)]);
        assert!(!tree.is_executing(child));
    }

    /// Entry and exit each bump the reentry id exactly once.
    #[test]
    fn reentry_id_moves_once_per_entry_and_exit() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::running_then(Status::SUCCESS, 1)]);
        let child = ids[0];
        let before = tree.reentry_id(child);

        tree.template_enter_execute(probe, None, false);
        let rid = tree.reentry_id(child);
        assert_eq!(rid, before.next());
        assert!(tree.is_running(child));

        tree.template_execute(probe);
        assert_eq!(tree.status(child), Status::SUCCESS);
        assert!(tree.is_exited(child, rid));
        assert!(!tree.is_reentered(child, rid));
    }

    /// Running children get `on_child_running`; hooks report nothing.
    #[test]
    fn hooks_never_notify() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        tree.template_enter_execute(probe, None, false);
        let hook = ids[0];
        tree.reset_for_restart(hook);
        tree.run_hook(probe, hook);
        assert_eq!(tree.status(hook), Status::SUCCESS);
        let probe_task = tree.task::<Probe>(probe).expect("probe");
        assert_eq!(probe_task.completed().len(), 1);
    }

    /// A cancelled token makes an entering task stillborn.
    #[test]
    fn cancelled_token_makes_task_stillborn() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let token = tree.cancel_token(probe).expect("token");
        token.cancel(1);
        tree.template_enter_execute(probe, None, false);
        assert_eq!(tree.status(probe), Status::CANCELLED);
        assert!(tree.is_stillborn(probe));
        assert_eq!(tree.status(ids[0]), Status::NEW);
    }

    /// `stop` cancels the subtree in reverse order without notifying.
    #[test]
    fn stop_is_silent_and_reverse_ordered() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tree, probe, ids) = probe_tree(vec![
            Scripted::running().logging("a", &log),
            Scripted::running().logging("b", &log),
        ]);
        tree.template_enter_execute(probe, None, false);
        assert!(ids.iter().all(|id| tree.is_running(*id)));

        tree.stop(probe);
        assert_eq!(tree.status(probe), Status::CANCELLED);
        assert_eq!(tree.status(ids[0]), Status::CANCELLED);
        assert_eq!(
            log.borrow().iter().filter(|l| l.starts_with("exit")).cloned().collect::<Vec<_>>(),
            vec!["exit b".to_string(), "exit a".to_string()]
        );
        let probe_task = tree.task::<Probe>(probe).expect("probe");
        assert!(probe_task.completed().is_empty());
    }

    /// Reset returns to NEW, keeps `prev_status`, and a rerun behaves the same.
    #[test]
    fn reset_for_restart_allows_identical_rerun() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        tree.template_enter_execute(probe, None, false);
        let child = ids[0];
        let first_rid = tree.reentry_id(child);

        tree.reset_for_restart(probe);
        assert_eq!(tree.status(probe), Status::NEW);
        assert_eq!(tree.status(child), Status::NEW);
        assert_eq!(tree.prev_status(child), Status::SUCCESS);
        assert_eq!(tree.control(child), None);

        tree.template_enter_execute(probe, None, false);
        assert_eq!(tree.status(child), Status::SUCCESS);
        assert_ne!(tree.reentry_id(child), first_rid);
    }

    /// A failing guard marks the child guard-failed without entering it.
    #[test]
    fn failing_guard_skips_entry() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let guard = tree.insert(Condition::new(|_: &()| false));
        tree.set_guard(ids[0], Some(guard)).expect("guard");

        tree.template_enter_execute(probe, None, false);
        let child = ids[0];
        assert_eq!(tree.status(child), Status::GUARD_FAILED);
        assert!(tree.is_stillborn(child));
        assert_eq!(tree.control(guard), None);
        let probe_task = tree.task::<Probe>(probe).expect("probe");
        assert_eq!(probe_task.completed(), vec![(child, Status::GUARD_FAILED)]);
        let scripted = tree.task::<Scripted>(child).expect("scripted");
        assert_eq!(scripted.entries(), 0);
    }

    /// A guard that stays RUNNING is a contract violation.
    #[test]
    #[should_panic(expected = "illegal guard status RUNNING")]
    fn running_guard_is_fatal() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let guard = tree.insert(Scripted::running());
        tree.set_guard(ids[0], Some(guard)).expect("guard");
        tree.template_enter_execute(probe, None, false);
    }

    /// Guards of guards are checked first.
    #[test]
    fn nested_guard_is_checked_first() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let outer = tree.insert(Success);
        let inner = tree.insert(Condition::new(|_: &()| false));
        tree.set_guard(outer, Some(inner)).expect("inner guard");
        tree.set_guard(ids[0], Some(outer)).expect("outer guard");
        tree.template_enter_execute(probe, None, false);
        assert_eq!(tree.status(ids[0]), Status::GUARD_FAILED);
        assert_eq!(tree.status(outer), Status::NEW);
    }

    /// Records the control it was entered under, then succeeds.
    #[derive(Default)]
    struct ControlSpy {
        seen: std::cell::Cell<Option<TaskId>>,
    }

    impl Task<()> for ControlSpy {
        fn execute(&self, ctx: &mut TaskCtx<'_, ()>) {
            self.seen.set(ctx.control());
            ctx.set_success();
        }
    }

    #[test]
    fn nested_guard_runs_under_the_checking_task() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let outer = tree.insert(Success);
        let inner = tree.insert(ControlSpy::default());
        tree.set_guard(outer, Some(inner)).expect("inner guard");
        tree.set_guard(ids[0], Some(outer)).expect("outer guard");
        tree.template_enter_execute(probe, None, false);

        assert_eq!(tree.status(ids[0]), Status::SUCCESS);
        let spy = tree.task::<ControlSpy>(inner).expect("spy");
        assert_eq!(spy.seen.get(), Some(probe));
        assert_eq!(tree.control(inner), None);
    }

    /// GUARD_FAILED copied from a child becomes ERROR.
    #[test]
    fn guard_failed_from_child_is_renormalized() {
        let (mut tree, probe, _) = probe_tree(vec![Scripted::running()]);
        tree.template_enter_execute(probe, None, false);
        tree.set_completed(probe, Status::GUARD_FAILED, true);
        assert_eq!(tree.status(probe), Status::ERROR);
    }

    /// Auto-listening tasks are cancelled as soon as the tree drains the inbox.
    #[test]
    fn auto_listen_cancels_on_drain() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::running()]);
        let child = ids[0];
        tree.flags_mut(child).auto_listen_cancel = true;
        let child_token = CancelToken::new();
        tree.set_cancel_token(child, Some(child_token.clone()));
        tree.template_enter_execute(probe, None, false);
        assert_eq!(child_token.listener_count(), 1);

        tree.cancel(&child_token, 5);
        assert_eq!(tree.status(child), Status::CANCELLED);
        assert_eq!(child_token.listener_count(), 0);
        let probe_task = tree.task::<Probe>(probe).expect("probe");
        assert_eq!(probe_task.completed(), vec![(child, Status::CANCELLED)]);
    }

    /// Slow start defers the first execute to the next tick.
    #[test]
    fn slow_start_defers_execute() {
        let (mut tree, probe, ids) = probe_tree(vec![Scripted::succeed()]);
        let child = ids[0];
        tree.flags_mut(child).slow_start = true;
        tree.template_enter_execute(probe, None, false);
        assert!(tree.is_running(child));
        let scripted = tree.task::<Scripted>(child).expect("scripted");
        assert_eq!(scripted.executions(), 0);

        tree.template_execute(probe);
        assert_eq!(tree.status(child), Status::SUCCESS);
    }

    /// Leaves reject child notifications.
    #[test]
    #[should_panic(expected = "leaf task received a child notification")]
    fn leaf_cannot_be_notified() {
        let mut tree: TaskTree<()> = TaskTree::new();
        let leaf = tree.insert(Success);
        let other = tree.insert(Success);
        root_context(&mut tree, leaf);
        assert_eq!(Task::<()>::layout(&Success), ChildLayout::Leaf);
        tree.template_enter_execute(leaf, None, false);
        tree.notify_completed(leaf, other);
    }
}
