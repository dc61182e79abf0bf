use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use tracing::warn;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::TaskId;
use crate::fsm::args::{ChangeStateArgs, DelayMode};
use crate::fsm::find_state_machine;
use crate::fsm::machine::StateMachine;
use crate::status::Status;

/// Leaf that switches the nearest (or the named) state machine to another
/// state and succeeds.
///
/// The target is either a task id or the name of a tree loaded through the
/// tree loader on first use. By default the task succeeds before the switch,
/// so it ends SUCCESS even though the switch stops the state it runs in.
#[derive(Debug, Default)]
pub struct ChangeStateTask {
    next_state: Cell<Option<TaskId>>,
    pub next_state_guid: Option<String>,
    /// Shared props given to the target state.
    pub state_props: Option<Rc<dyn Any>>,
    /// When terminal, the current state completes with it before the switch.
    pub cur_state_result: Status,
    pub machine_name: Option<String>,
    pub delay_mode: DelayMode,
}

impl ChangeStateTask {
    pub fn to(next_state: TaskId) -> Self {
        Self {
            next_state: Cell::new(Some(next_state)),
            ..Self::default()
        }
    }

    /// Target the tree `guid`, loaded lazily.
    pub fn to_tree(guid: &str) -> Self {
        Self {
            next_state_guid: Some(guid.to_string()),
            ..Self::default()
        }
    }

    pub fn with_state_props(mut self, props: Rc<dyn Any>) -> Self {
        self.state_props = Some(props);
        self
    }

    pub fn with_cur_state_result(mut self, status: Status) -> Self {
        self.cur_state_result = status;
        self
    }

    pub fn with_machine_name(mut self, name: &str) -> Self {
        self.machine_name = Some(name.to_string());
        self
    }

    pub fn with_delay_mode(mut self, delay_mode: DelayMode) -> Self {
        self.delay_mode = delay_mode;
        self
    }

    pub fn next_state(&self) -> Option<TaskId> {
        self.next_state.get()
    }

    fn resolve_next_state<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) -> Option<TaskId> {
        if let Some(next) = self.next_state.get() {
            return Some(next);
        }
        let Some(guid) = &self.next_state_guid else {
            warn!(task = %ctx.id(), "change-state task has no target");
            return None;
        };
        let loader = ctx.tree().loader();
        match loader.load_root_task(ctx.tree_mut(), guid) {
            Ok(next) => {
                self.next_state.set(Some(next));
                Some(next)
            }
            Err(err) => {
                warn!(task = %ctx.id(), error = %err, "next state load failed");
                None
            }
        }
    }
}

impl<B: 'static> Task<B> for ChangeStateTask {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let Some(next) = self.resolve_next_state(ctx) else {
            ctx.set_failed(Status::ERROR);
            return;
        };
        let machine = match find_state_machine(ctx.tree(), ctx.id(), self.machine_name.as_deref()) {
            Ok(machine) => machine,
            Err(err) => {
                warn!(task = %ctx.id(), error = %err, "no state machine to switch");
                ctx.set_failed(Status::ERROR);
                return;
            }
        };
        let running = ctx.tree().is_running(machine);
        let args = match ChangeStateArgs::plain()
            .with_delay(self.delay_mode)
            .checked(running, ctx.cur_frame())
        {
            Ok(args) => args,
            Err(err) => {
                warn!(task = %ctx.id(), error = %err, "state change rejected");
                ctx.set_failed(Status::ERROR);
                return;
            }
        };
        if let Some(props) = &self.state_props {
            ctx.tree_mut().set_shared_props(next, Some(Rc::clone(props)));
        }

        let rid = ctx.reentry_id();
        let cur_state = ctx
            .tree()
            .task::<StateMachine<B>>(machine)
            .and_then(|machine| machine.cur_state());
        // Only a state with delayed notify may be given a result here; with
        // immediate notify the machine would move on before the switch.
        if let Some(cur) = cur_state {
            let tree = ctx.tree();
            if self.cur_state_result.is_completed()
                && tree.is_running(cur)
                && !tree.options(cur).disable_delay_notify
            {
                ctx.tree_mut().set_completed(cur, self.cur_state_result, false);
            }
        }

        let delayed = !ctx.options().disable_delay_notify;
        if delayed && !ctx.is_exited(rid) {
            ctx.set_success();
        }
        if let Err(err) = StateMachine::change_state(ctx.tree_mut(), machine, next, args) {
            warn!(task = %ctx.id(), error = %err, "state change rejected");
            if !ctx.is_exited(rid) {
                ctx.set_failed(Status::ERROR);
            }
            return;
        }
        if !delayed && !ctx.is_exited(rid) {
            ctx.set_success();
        }
    }

    fn can_handle_event(&self, _ctx: &TaskCtx<'_, B>, _event: &dyn Any) -> bool {
        false
    }
}
