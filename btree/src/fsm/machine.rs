//! A decorator whose single child is the current state.
//!
//! States are ordinary tasks. A transition request is stored on the target
//! state (its control data) and picked up by the machine's `execute`: the
//! target's guard is checked, the current state is stopped and filed into the
//! undo or redo history, and the target becomes the child with its own child
//! cancel token.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::core::task::{Task, TaskCtx};
use crate::core::tree::TaskTree;
use crate::core::types::{ChildLayout, TaskId};
use crate::error::{TaskError, fatal};
use crate::fsm::args::{ChangeStateArgs, DelayMode, StateCommand};
use crate::io::config::StateMachineConfig;
use crate::status::Status;

/// A state switch as seen by the listener. `from` is `None` for the first
/// state and `to` is `None` when the last state completed with nothing queued.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub from: Option<TaskId>,
    pub to: Option<TaskId>,
    pub args: Option<ChangeStateArgs>,
}

pub type StateListener<B> = Rc<dyn Fn(&mut TaskCtx<'_, B>, &StateChange)>;

/// Hooks for the situations a machine cannot resolve by itself. `ctx` is the
/// machine's context.
pub trait StateMachineHandler<B: 'static> {
    /// The queued state's guard failed; the current state keeps running.
    fn on_next_state_guard_failed(&self, _ctx: &mut TaskCtx<'_, B>, _next: TaskId) {}

    /// `state` completed with no next state queued. Return true after
    /// handling it (typically by queueing a state) to skip the default of
    /// completing with `none_child_status`.
    fn on_next_state_absent(&self, _ctx: &mut TaskCtx<'_, B>, _state: TaskId) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overflow {
    DiscardHead,
    DiscardTail,
}

/// Bounded state history. Capacity 0 disables it.
#[derive(Debug)]
struct History {
    states: VecDeque<TaskId>,
    capacity: usize,
    overflow: Overflow,
}

impl History {
    fn new(capacity: usize, overflow: Overflow) -> Self {
        Self {
            states: VecDeque::new(),
            capacity,
            overflow,
        }
    }

    fn make_room(&mut self) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.states.len() >= self.capacity {
            match self.overflow {
                Overflow::DiscardHead => self.states.pop_front(),
                Overflow::DiscardTail => self.states.pop_back(),
            };
        }
        true
    }

    fn push_back(&mut self, state: TaskId) {
        if self.make_room() {
            self.states.push_back(state);
        }
    }

    fn push_front(&mut self, state: TaskId) {
        if self.make_room() {
            self.states.push_front(state);
        }
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.states.len() > capacity {
            match self.overflow {
                Overflow::DiscardHead => self.states.pop_front(),
                Overflow::DiscardTail => self.states.pop_back(),
            };
        }
    }
}

pub struct StateMachine<B: 'static> {
    name: Option<String>,
    none_child_status: Status,
    init_state: Cell<Option<TaskId>>,
    init_state_props: RefCell<Option<Rc<dyn Any>>>,
    cur_state: Cell<Option<TaskId>>,
    temp_next_state: Cell<Option<TaskId>>,
    /// Cancel token handed to the current state.
    state_token: RefCell<Option<CancelToken>>,
    undo: RefCell<History>,
    redo: RefCell<History>,
    listener: RefCell<Option<StateListener<B>>>,
    handler: RefCell<Option<Rc<dyn StateMachineHandler<B>>>>,
}

impl<B: 'static> StateMachine<B> {
    pub fn new() -> Self {
        Self {
            name: None,
            none_child_status: Status::SUCCESS,
            init_state: Cell::new(None),
            init_state_props: RefCell::new(None),
            cur_state: Cell::new(None),
            temp_next_state: Cell::new(None),
            state_token: RefCell::new(None),
            undo: RefCell::new(History::new(0, Overflow::DiscardHead)),
            redo: RefCell::new(History::new(0, Overflow::DiscardTail)),
            listener: RefCell::new(None),
            handler: RefCell::new(None),
        }
    }

    /// Machine with the history sizes and empty-machine status of `config`.
    pub fn from_config(config: &StateMachineConfig) -> Self {
        let machine = Self::new().with_none_child_status(config.none_child_status);
        machine.set_undo_queue_size(config.undo_queue_size);
        machine.set_redo_queue_size(config.redo_queue_size);
        machine
    }

    /// Named machines register in the tree's registry while running.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Status to complete with when there is no state to run. RUNNING keeps
    /// the machine running; NEW means SUCCESS.
    pub fn with_none_child_status(mut self, status: Status) -> Self {
        self.none_child_status = status;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn none_child_status(&self) -> Status {
        if self.none_child_status == Status::NEW {
            Status::SUCCESS
        } else {
            self.none_child_status
        }
    }

    pub fn cur_state(&self) -> Option<TaskId> {
        self.cur_state.get()
    }

    pub fn temp_next_state(&self) -> Option<TaskId> {
        self.temp_next_state.get()
    }

    /// Drop the queued transition, returning it.
    pub fn discard_temp_next_state(&self) -> Option<TaskId> {
        self.temp_next_state.take()
    }

    pub fn init_state(&self) -> Option<TaskId> {
        self.init_state.get()
    }

    /// Undo history, oldest first.
    pub fn undo_states(&self) -> Vec<TaskId> {
        self.undo.borrow().states.iter().copied().collect()
    }

    /// Redo history, next redo first.
    pub fn redo_states(&self) -> Vec<TaskId> {
        self.redo.borrow().states.iter().copied().collect()
    }

    pub fn peek_undo_state(&self) -> Option<TaskId> {
        self.undo.borrow().states.back().copied()
    }

    pub fn peek_redo_state(&self) -> Option<TaskId> {
        self.redo.borrow().states.front().copied()
    }

    /// Undo history length; overflow drops the oldest entry. 0 disables undo.
    pub fn set_undo_queue_size(&self, size: usize) {
        self.undo.borrow_mut().set_capacity(size);
    }

    /// Redo history length; overflow drops the furthest entry. 0 disables redo.
    pub fn set_redo_queue_size(&self, size: usize) {
        self.redo.borrow_mut().set_capacity(size);
    }

    pub fn set_listener(&self, listener: impl Fn(&mut TaskCtx<'_, B>, &StateChange) + 'static) {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn clear_listener(&self) {
        self.listener.borrow_mut().take();
    }

    pub fn set_handler(&self, handler: Option<Rc<dyn StateMachineHandler<B>>>) {
        *self.handler.borrow_mut() = handler;
    }

    /// Shared props given to the initial state on every entry.
    pub fn set_init_state_props(&self, props: Option<Rc<dyn Any>>) {
        *self.init_state_props.borrow_mut() = props;
    }

    fn get(tree: &TaskTree<B>, machine: TaskId) -> Result<Rc<Self>, TaskError> {
        tree.task::<Self>(machine)
            .ok_or(TaskError::NotAStateMachine(machine))
    }

    /// Make `state` the state entered when the machine starts without a
    /// queued transition. The state is owned by the machine.
    pub fn set_init_state(
        tree: &mut TaskTree<B>,
        machine: TaskId,
        state: TaskId,
    ) -> Result<(), TaskError> {
        let sm = Self::get(tree, machine)?;
        tree.adopt(machine, state)?;
        sm.init_state.set(Some(state));
        Ok(())
    }

    /// Request a switch to `next`.
    ///
    /// A machine that is not running keeps the request for its next run. A
    /// running machine applies a request without delay at once. Any request
    /// that was still queued is replaced.
    pub fn change_state(
        tree: &mut TaskTree<B>,
        machine: TaskId,
        next: TaskId,
        args: ChangeStateArgs,
    ) -> Result<(), TaskError> {
        let sm = Self::get(tree, machine)?;
        if next == machine {
            return Err(TaskError::SelfAttach(machine));
        }
        if let Some(owner) = tree.parent(next).filter(|&owner| owner != machine) {
            return Err(TaskError::AlreadyAttached {
                child: next,
                parent: owner,
            });
        }
        let running = tree.is_running(machine);
        let args = args.checked(running, tree.cur_frame())?;
        let apply_now = running && args.delay == DelayMode::None;
        tree.set_control_data(next, Some(Rc::new(args)));
        sm.temp_next_state.set(Some(next));
        if apply_now {
            if tree.is_executing(machine) {
                tree.call(machine, |task, ctx| task.execute(ctx));
            } else {
                tree.template_execute(machine);
            }
        }
        Ok(())
    }

    /// Go back to the last undo state. Returns false when there is none.
    /// The state leaves the history only once the switch happens.
    pub fn undo_change_state(
        tree: &mut TaskTree<B>,
        machine: TaskId,
        args: ChangeStateArgs,
    ) -> Result<bool, TaskError> {
        if !args.is_undo() {
            return Err(TaskError::InvalidChangeStateArgs(format!(
                "undo needs an undo command, got {:?}",
                args.cmd
            )));
        }
        let Some(prev) = Self::get(tree, machine)?.peek_undo_state() else {
            return Ok(false);
        };
        Self::change_state(tree, machine, prev, args)?;
        Ok(true)
    }

    /// Go forward to the first redo state. Returns false when there is none.
    pub fn redo_change_state(
        tree: &mut TaskTree<B>,
        machine: TaskId,
        args: ChangeStateArgs,
    ) -> Result<bool, TaskError> {
        if !args.is_redo() {
            return Err(TaskError::InvalidChangeStateArgs(format!(
                "redo needs a redo command, got {:?}",
                args.cmd
            )));
        }
        let Some(next) = Self::get(tree, machine)?.peek_redo_state() else {
            return Ok(false);
        };
        Self::change_state(tree, machine, next, args)?;
        Ok(true)
    }

    /// Cancel the current state through its own token.
    pub fn cancel_cur_state(&self, tree: &mut TaskTree<B>, code: i32) {
        let Some(state) = self.cur_state.get() else {
            return;
        };
        if !tree.is_running(state) {
            return;
        }
        if let Some(token) = tree.cancel_token(state) {
            tree.cancel(&token, code);
        }
    }

    fn args_of(tree: &TaskTree<B>, state: TaskId) -> ChangeStateArgs {
        tree.control_data(state)
            .and_then(|data| data.downcast::<ChangeStateArgs>().ok())
            .map(|args| (*args).clone())
            .unwrap_or_default()
    }

    fn is_ready(&self, ctx: &TaskCtx<'_, B>, cur: Option<TaskId>, next: TaskId) -> bool {
        if cur.is_none() {
            return true;
        }
        let args = Self::args_of(ctx.tree(), next);
        match args.delay {
            DelayMode::None => true,
            DelayMode::CurrentCompleted => false,
            DelayMode::NextFrame => args.frame.is_none_or(|frame| ctx.cur_frame() >= frame),
        }
    }

    fn notify_change(&self, ctx: &mut TaskCtx<'_, B>, change: StateChange) {
        debug!(
            machine = %ctx.id(),
            from = ?change.from,
            to = ?change.to,
            "state changed"
        );
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(ctx, &change);
        }
    }

    fn handler(&self) -> Option<Rc<dyn StateMachineHandler<B>>> {
        self.handler.borrow().clone()
    }

    fn release_state_token(&self, ctx: &mut TaskCtx<'_, B>, state: TaskId) {
        let Some(token) = self.state_token.borrow_mut().take() else {
            return;
        };
        if let Some(parent_token) = ctx.cancel_token() {
            parent_token.unregister_child(&token);
        }
        token.reset();
        let owned = ctx
            .tree()
            .cancel_token(state)
            .is_some_and(|current| current.ptr_eq(&token));
        if owned {
            ctx.tree_mut().set_cancel_token(state, None);
        }
    }

    fn give_state_token(&self, ctx: &mut TaskCtx<'_, B>, state: TaskId) {
        let Some(parent_token) = ctx.cancel_token() else {
            fatal(TaskError::MissingContext {
                task: ctx.id(),
                slot: "cancel token",
            });
        };
        let token = parent_token.new_child();
        ctx.tree_mut().set_cancel_token(state, Some(token.clone()));
        *self.state_token.borrow_mut() = Some(token);
    }

    fn detach_state(&self, ctx: &mut TaskCtx<'_, B>) {
        let id = ctx.id();
        if let Some(state) = ctx.first_child() {
            self.release_state_token(ctx, state);
            if let Err(err) = ctx.tree_mut().remove_child(id, 0) {
                fatal(err);
            }
        }
        self.cur_state.set(None);
    }

    /// Stop `cur`, file it into the history and attach `next`.
    fn switch_to(&self, ctx: &mut TaskCtx<'_, B>, cur: Option<TaskId>, next: TaskId) {
        let id = ctx.id();
        let args = Self::args_of(ctx.tree(), next);
        ctx.tree_mut().set_control_data(next, None);
        if let Some(cur) = cur {
            ctx.stop(cur);
            self.release_state_token(ctx, cur);
        }
        match args.cmd {
            StateCommand::Undo => {
                self.undo.borrow_mut().states.pop_back();
                if let Some(cur) = cur {
                    self.redo.borrow_mut().push_front(cur);
                }
            }
            StateCommand::Redo => {
                self.redo.borrow_mut().states.pop_front();
                if let Some(cur) = cur {
                    self.undo.borrow_mut().push_back(cur);
                }
            }
            StateCommand::None => {
                self.redo.borrow_mut().states.clear();
                if let Some(cur) = cur {
                    self.undo.borrow_mut().push_back(cur);
                }
            }
        }
        self.notify_change(
            ctx,
            StateChange {
                from: cur,
                to: Some(next),
                args: Some(args),
            },
        );

        self.give_state_token(ctx, next);
        let attached = match cur {
            Some(_) => ctx.tree_mut().set_child(id, 0, next).map(|_| ()),
            None => ctx.tree_mut().add_child(id, next).map(|_| ()),
        };
        if let Err(err) = attached {
            fatal(err);
        }
        self.cur_state.set(Some(next));
    }

    fn on_no_child_running(&self, ctx: &mut TaskCtx<'_, B>) {
        let status = self.none_child_status();
        if status != Status::RUNNING {
            ctx.set_completed(status, false);
        }
    }
}

impl<B: 'static> Default for StateMachine<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static> Task<B> for StateMachine<B> {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn before_enter(&self, ctx: &mut TaskCtx<'_, B>) {
        let init = self.init_state.get();
        if let Some(init) = init {
            let props = self.init_state_props.borrow().clone();
            if props.is_some() {
                ctx.tree_mut().set_shared_props(init, props);
            }
        }
        if self.temp_next_state.get().is_none() {
            self.temp_next_state.set(init);
        }
        if let Some(next) = self.temp_next_state.get() {
            if ctx.tree().control_data(next).is_none() {
                ctx.tree_mut()
                    .set_control_data(next, Some(Rc::new(ChangeStateArgs::plain())));
            }
        }
        if ctx.first_child().is_some() {
            warn!(machine = %ctx.id(), "state machine entered with a leftover state");
            self.detach_state(ctx);
        }
        if let Some(name) = &self.name {
            let id = ctx.id();
            ctx.tree_mut().state_machines_mut().register(name, id);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let mut cur = ctx.first_child();
        if let Some(next) = self.temp_next_state.get() {
            if self.is_ready(ctx, cur, next) {
                self.temp_next_state.set(None);
                let guard = ctx.tree().guard(next);
                if ctx.check_guard(guard) {
                    self.switch_to(ctx, cur, next);
                    cur = Some(next);
                } else {
                    debug!(machine = %ctx.id(), state = %next, "next state guard failed");
                    ctx.tree_mut().set_control_data(next, None);
                    ctx.set_guard_failed(next, None);
                    if let Some(handler) = self.handler() {
                        handler.on_next_state_guard_failed(ctx, next);
                    }
                }
            }
        }
        match cur {
            Some(state) => ctx.run_child_directly(state),
            None => self.on_no_child_running(ctx),
        }
    }

    fn exit(&self, ctx: &mut TaskCtx<'_, B>) {
        self.detach_state(ctx);
        self.temp_next_state.set(None);
        self.undo.borrow_mut().states.clear();
        self.redo.borrow_mut().states.clear();
        if let Some(name) = &self.name {
            let id = ctx.id();
            ctx.tree_mut().state_machines_mut().unregister(name, id);
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        debug_assert_eq!(ctx.first_child(), Some(child), "only the current state notifies");
        self.release_state_token(ctx, child);

        let Some(next) = self.temp_next_state.get() else {
            if let Some(handler) = self.handler() {
                if handler.on_next_state_absent(ctx, child) {
                    return;
                }
            }
            self.undo.borrow_mut().push_back(child);
            self.detach_state(ctx);
            self.notify_change(
                ctx,
                StateChange {
                    from: Some(child),
                    to: None,
                    args: None,
                },
            );
            self.on_no_child_running(ctx);
            return;
        };
        // The current state is done: a delayed request is due now.
        let args = Self::args_of(ctx.tree(), next).with_delay(DelayMode::None);
        ctx.tree_mut().set_control_data(next, Some(Rc::new(args)));
        if ctx.is_executing() {
            self.execute(ctx);
        } else {
            ctx.template_execute();
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        if let Some(state) = ctx.first_child() {
            ctx.dispatch_event(state, event);
        }
    }

    fn reset_for_restart(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(init) = self.init_state.get() {
            ctx.tree_mut().reset_for_restart(init);
        }
        self.detach_state(ctx);
        self.temp_next_state.set(None);
        self.undo.borrow_mut().states.clear();
        self.redo.borrow_mut().states.clear();
    }
}
