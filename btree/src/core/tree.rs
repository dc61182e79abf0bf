//! Arena of task nodes.
//!
//! `TaskTree` owns every node of one tree plus the services that are shared by
//! the whole tree: the current frame, the tree loader, the bound entity, the
//! state-machine registry and the cancel inbox. Parent and child links are
//! [`TaskId`] handles into the arena.
//!
//! Two links point upward from a node:
//!
//! - `parent`: structural owner, set when the node is attached as a child or
//!   guard and cleared when it is detached.
//! - `control`: runtime parent, captured at entry and cleared by
//!   [`TaskTree::unset_control`]. This is who gets notified.
//!
//! Accessors taking a `TaskId` panic if the id was not issued by this tree.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::cancel::{CancelInbox, CancelToken};
use crate::core::task::Task;
use crate::core::types::{Children, ContextSlot, ReentryId, RunFlags, TaskFlags, TaskId};
use crate::error::TaskError;
use crate::fsm::StateMachineRegistry;
use crate::loader::{NullLoader, TreeLoader};
use crate::status::Status;

pub(crate) struct TaskNode<B: 'static> {
    pub task: Rc<dyn Task<B>>,
    pub any: Rc<dyn Any>,
    pub kind: &'static str,
    pub name: Option<String>,
    pub parent: Option<TaskId>,
    pub control: Option<TaskId>,
    pub children: Children,
    pub guard: Option<TaskId>,
    pub status: Status,
    pub prev_status: Status,
    pub run: RunFlags,
    pub flags: TaskFlags,
    pub options: TaskFlags,
    pub enter_frame: u32,
    pub exit_frame: u32,
    pub reentry: ReentryId,
    pub blackboard: ContextSlot<Rc<RefCell<B>>>,
    pub cancel_token: ContextSlot<CancelToken>,
    pub shared_props: ContextSlot<Rc<dyn Any>>,
    pub control_data: Option<Rc<dyn Any>>,
}

pub struct TaskTree<B: 'static> {
    pub(crate) nodes: Vec<TaskNode<B>>,
    pub(crate) frame: u32,
    pub(crate) entry: Option<TaskId>,
    loader: Rc<dyn TreeLoader<B>>,
    entity: Option<Rc<dyn Any>>,
    machines: StateMachineRegistry,
    pub(crate) cancel_inbox: Rc<CancelInbox>,
}

impl<B: 'static> TaskTree<B> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            frame: 0,
            entry: None,
            loader: Rc::new(NullLoader),
            entity: None,
            machines: StateMachineRegistry::default(),
            cancel_inbox: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Add a detached task to the arena.
    pub fn insert<T: Task<B>>(&mut self, task: T) -> TaskId {
        let id = TaskId::from_index(
            u32::try_from(self.nodes.len()).unwrap_or_else(|_| panic!("task arena overflow")),
        );
        let layout = task.layout();
        let kind = task.kind();
        let rc = Rc::new(task);
        let any: Rc<dyn Any> = rc.clone();
        self.nodes.push(TaskNode {
            task: rc,
            any,
            kind,
            name: None,
            parent: None,
            control: None,
            children: Children::for_layout(layout),
            guard: None,
            status: Status::NEW,
            prev_status: Status::NEW,
            run: RunFlags::default(),
            flags: TaskFlags::default(),
            options: TaskFlags::default(),
            enter_frame: 0,
            exit_frame: 0,
            reentry: ReentryId::default(),
            blackboard: ContextSlot::Empty,
            cancel_token: ContextSlot::Empty,
            shared_props: ContextSlot::Empty,
            control_data: None,
        });
        trace!(task = %id, kind, "task inserted");
        id
    }

    /// Insert a task with a diagnostic name.
    pub fn insert_named<T: Task<B>>(&mut self, name: &str, task: T) -> TaskId {
        let id = self.insert(task);
        self.nodes[id.index()].name = Some(name.to_string());
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        id.index() < self.nodes.len()
    }

    pub(crate) fn node(&self, id: TaskId) -> &TaskNode<B> {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: TaskId) -> &mut TaskNode<B> {
        &mut self.nodes[id.index()]
    }

    /// Typed access to the node kind behind `id`.
    pub fn task<T: Task<B>>(&self, id: TaskId) -> Option<Rc<T>> {
        Rc::clone(&self.node(id).any).downcast::<T>().ok()
    }

    pub(crate) fn behavior(&self, id: TaskId) -> Rc<dyn Task<B>> {
        Rc::clone(&self.node(id).task)
    }

    pub fn kind(&self, id: TaskId) -> &'static str {
        self.node(id).kind
    }

    pub fn name(&self, id: TaskId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    pub fn set_name(&mut self, id: TaskId, name: &str) {
        self.node_mut(id).name = Some(name.to_string());
    }

    // ---- tree services ----

    pub fn cur_frame(&self) -> u32 {
        self.frame
    }

    /// The entry node, once a `TaskEntry` owns this tree.
    pub fn entry(&self) -> Option<TaskId> {
        self.entry
    }

    pub fn loader(&self) -> Rc<dyn TreeLoader<B>> {
        Rc::clone(&self.loader)
    }

    pub fn set_loader(&mut self, loader: Rc<dyn TreeLoader<B>>) {
        self.loader = loader;
    }

    pub fn entity(&self) -> Option<Rc<dyn Any>> {
        self.entity.clone()
    }

    pub fn set_entity(&mut self, entity: Option<Rc<dyn Any>>) {
        self.entity = entity;
    }

    pub fn state_machines(&self) -> &StateMachineRegistry {
        &self.machines
    }

    pub fn state_machines_mut(&mut self) -> &mut StateMachineRegistry {
        &mut self.machines
    }

    // ---- node state ----

    pub fn status(&self, id: TaskId) -> Status {
        self.node(id).status
    }

    /// Status at the moment of the latest entry (or reset), clamped to 63.
    pub fn prev_status(&self, id: TaskId) -> Status {
        self.node(id).prev_status
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.node(id).status == Status::RUNNING
    }

    pub fn is_completed(&self, id: TaskId) -> bool {
        self.node(id).status.is_completed()
    }

    pub fn is_executing(&self, id: TaskId) -> bool {
        self.node(id).run.executing
    }

    pub fn is_stillborn(&self, id: TaskId) -> bool {
        self.node(id).run.stillborn
    }

    pub fn is_notified(&self, id: TaskId) -> bool {
        self.node(id).run.notified
    }

    pub fn reentry_id(&self, id: TaskId) -> ReentryId {
        self.node(id).reentry
    }

    /// The run identified by `rid` is over.
    pub fn is_exited(&self, id: TaskId, rid: ReentryId) -> bool {
        self.node(id).reentry != rid
    }

    /// The task has been entered again since `rid` was taken, not merely exited.
    pub fn is_reentered(&self, id: TaskId, rid: ReentryId) -> bool {
        let cur = self.node(id).reentry;
        cur != rid && cur != rid.next()
    }

    pub fn enter_frame(&self, id: TaskId) -> u32 {
        self.node(id).enter_frame
    }

    pub fn exit_frame(&self, id: TaskId) -> u32 {
        self.node(id).exit_frame
    }

    /// Frames since entry while running, or the length of the last run.
    pub fn run_frames(&self, id: TaskId) -> u32 {
        let node = self.node(id);
        if node.status == Status::RUNNING {
            self.frame.saturating_sub(node.enter_frame)
        } else {
            node.exit_frame.saturating_sub(node.enter_frame)
        }
    }

    /// Default options applied on every entry.
    pub fn flags(&self, id: TaskId) -> TaskFlags {
        self.node(id).flags
    }

    pub fn flags_mut(&mut self, id: TaskId) -> &mut TaskFlags {
        &mut self.node_mut(id).flags
    }

    /// Options of the current (or latest) run.
    pub fn options(&self, id: TaskId) -> TaskFlags {
        self.node(id).options
    }

    pub fn options_mut(&mut self, id: TaskId) -> &mut TaskFlags {
        &mut self.node_mut(id).options
    }

    pub fn parent(&self, id: TaskId) -> Option<TaskId> {
        self.node(id).parent
    }

    pub fn control(&self, id: TaskId) -> Option<TaskId> {
        self.node(id).control
    }

    /// Set the runtime control without entering.
    pub fn set_control(&mut self, id: TaskId, control: TaskId) {
        self.node_mut(id).control = Some(control);
    }

    // ---- context ----

    pub fn blackboard(&self, id: TaskId) -> Option<Rc<RefCell<B>>> {
        self.node(id).blackboard.get().cloned()
    }

    pub fn set_blackboard(&mut self, id: TaskId, blackboard: Option<Rc<RefCell<B>>>) {
        self.node_mut(id).blackboard = match blackboard {
            Some(bb) => ContextSlot::Own(bb),
            None => ContextSlot::Empty,
        };
    }

    pub fn cancel_token(&self, id: TaskId) -> Option<CancelToken> {
        self.node(id).cancel_token.get().cloned()
    }

    pub fn set_cancel_token(&mut self, id: TaskId, token: Option<CancelToken>) {
        self.node_mut(id).cancel_token = match token {
            Some(token) => ContextSlot::Own(token),
            None => ContextSlot::Empty,
        };
    }

    pub fn shared_props(&self, id: TaskId) -> Option<Rc<dyn Any>> {
        self.node(id).shared_props.get().cloned()
    }

    pub fn set_shared_props(&mut self, id: TaskId, props: Option<Rc<dyn Any>>) {
        self.node_mut(id).shared_props = match props {
            Some(props) => ContextSlot::Own(props),
            None => ContextSlot::Empty,
        };
    }

    /// Data attached by the control (the state machine stores transition
    /// requests here).
    pub fn control_data(&self, id: TaskId) -> Option<Rc<dyn Any>> {
        self.node(id).control_data.clone()
    }

    pub fn set_control_data(&mut self, id: TaskId, data: Option<Rc<dyn Any>>) {
        self.node_mut(id).control_data = data;
    }

    // ---- structure ----

    pub fn children(&self, id: TaskId) -> &[TaskId] {
        self.node(id).children.as_slice()
    }

    pub fn child_count(&self, id: TaskId) -> usize {
        self.children(id).len()
    }

    pub fn child(&self, id: TaskId, index: usize) -> Option<TaskId> {
        self.children(id).get(index).copied()
    }

    pub fn index_child(&self, id: TaskId, child: TaskId) -> Option<usize> {
        self.children(id).iter().position(|c| *c == child)
    }

    pub fn first_child(&self, id: TaskId) -> Option<TaskId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: TaskId) -> Option<TaskId> {
        self.children(id).last().copied()
    }

    pub fn is_first_child(&self, id: TaskId, child: TaskId) -> bool {
        self.first_child(id) == Some(child)
    }

    pub fn is_last_child(&self, id: TaskId, child: TaskId) -> bool {
        self.last_child(id) == Some(child)
    }

    pub fn guard(&self, id: TaskId) -> Option<TaskId> {
        self.node(id).guard
    }

    /// Append `child`. Returns its index.
    pub fn add_child(&mut self, parent: TaskId, child: TaskId) -> Result<usize, TaskError> {
        self.check_attach(parent, child)?;
        let index = match &mut self.node_mut(parent).children {
            Children::Leaf => return Err(TaskError::LeafHasNoChildren(parent)),
            Children::Single(Some(_)) => return Err(TaskError::DecoratorOccupied(parent)),
            Children::Single(slot) => {
                *slot = Some(child);
                0
            }
            Children::Many(children) => {
                children.push(child);
                children.len() - 1
            }
        };
        self.node_mut(child).parent = Some(parent);
        Ok(index)
    }

    /// Add every task in order.
    pub fn add_children(
        &mut self,
        parent: TaskId,
        children: impl IntoIterator<Item = TaskId>,
    ) -> Result<(), TaskError> {
        for child in children {
            self.add_child(parent, child)?;
        }
        Ok(())
    }

    /// Replace the child at `index`, detaching and returning the old one.
    ///
    /// Replacing a child with itself is a no-op.
    pub fn set_child(
        &mut self,
        parent: TaskId,
        index: usize,
        child: TaskId,
    ) -> Result<TaskId, TaskError> {
        let old = self
            .child(parent, index)
            .ok_or_else(|| self.index_error(parent, index))?;
        if old == child {
            return Ok(old);
        }
        self.check_attach(parent, child)?;
        match &mut self.node_mut(parent).children {
            Children::Leaf => return Err(TaskError::LeafHasNoChildren(parent)),
            Children::Single(slot) => *slot = Some(child),
            Children::Many(children) => children[index] = child,
        }
        self.node_mut(child).parent = Some(parent);
        self.detach(old);
        Ok(old)
    }

    /// Remove and detach the child at `index`.
    pub fn remove_child(&mut self, parent: TaskId, index: usize) -> Result<TaskId, TaskError> {
        let removed = match &mut self.node_mut(parent).children {
            Children::Leaf => None,
            Children::Single(slot) if index == 0 => slot.take(),
            Children::Single(_) => None,
            Children::Many(children) if index < children.len() => Some(children.remove(index)),
            Children::Many(_) => None,
        };
        let removed = removed.ok_or_else(|| self.index_error(parent, index))?;
        self.detach(removed);
        Ok(removed)
    }

    /// Remove `child` if it belongs to `parent`.
    pub fn remove_child_task(&mut self, parent: TaskId, child: TaskId) -> bool {
        match self.index_child(parent, child) {
            Some(index) => self.remove_child(parent, index).is_ok(),
            None => false,
        }
    }

    pub fn remove_all_children(&mut self, parent: TaskId) {
        while self.child_count(parent) > 0 {
            let last = self.child_count(parent) - 1;
            if self.remove_child(parent, last).is_err() {
                break;
            }
        }
    }

    /// Attach (or clear) the precondition of `task`.
    pub fn set_guard(&mut self, task: TaskId, guard: Option<TaskId>) -> Result<(), TaskError> {
        if let Some(guard) = guard {
            if guard == task {
                return Err(TaskError::SelfAttach(task));
            }
            self.check_owner(task, guard)?;
        }
        if let Some(old) = self.node(task).guard {
            self.node_mut(old).parent = None;
        }
        self.node_mut(task).guard = guard;
        if let Some(guard) = guard {
            self.node_mut(guard).parent = Some(task);
        }
        Ok(())
    }

    /// Claim `task` as owned by `owner` without making it a child.
    ///
    /// Node kinds that hold tasks outside the child list (a loop condition, a
    /// state machine's initial state) call this so the task cannot be attached
    /// elsewhere.
    pub fn adopt(&mut self, owner: TaskId, task: TaskId) -> Result<(), TaskError> {
        if owner == task {
            return Err(TaskError::SelfAttach(task));
        }
        self.check_owner(owner, task)?;
        self.node_mut(task).parent = Some(owner);
        Ok(())
    }

    fn check_attach(&self, parent: TaskId, child: TaskId) -> Result<(), TaskError> {
        if !self.contains(child) {
            return Err(TaskError::UnknownTask(child));
        }
        if parent == child {
            return Err(TaskError::SelfAttach(child));
        }
        if matches!(self.node(parent).children, Children::Leaf) {
            return Err(TaskError::LeafHasNoChildren(parent));
        }
        self.check_owner(parent, child)?;
        if self.entry == Some(child) {
            return Err(TaskError::IllegalState {
                task: child,
                detail: "the entry cannot become a child".to_string(),
            });
        }
        Ok(())
    }

    fn check_owner(&self, owner: TaskId, task: TaskId) -> Result<(), TaskError> {
        if !self.contains(task) {
            return Err(TaskError::UnknownTask(task));
        }
        let node = self.node(task);
        match node.parent.or(node.control) {
            Some(current) if current != owner => Err(TaskError::AlreadyAttached {
                child: task,
                parent: current,
            }),
            _ => Ok(()),
        }
    }

    fn index_error(&self, parent: TaskId, index: usize) -> TaskError {
        TaskError::ChildIndexOutOfRange {
            parent,
            index,
            len: self.child_count(parent),
        }
    }

    fn detach(&mut self, child: TaskId) {
        self.node_mut(child).parent = None;
        self.unset_control(child);
    }

    /// Clear the control link and every context slot, owned or inherited.
    pub fn unset_control(&mut self, id: TaskId) {
        let node = self.node_mut(id);
        node.control = None;
        node.blackboard = ContextSlot::Empty;
        node.cancel_token = ContextSlot::Empty;
        node.shared_props = ContextSlot::Empty;
        node.control_data = None;
    }

    // ---- locks ----

    fn lock_index(lock: u8) -> Result<usize, TaskError> {
        match lock {
            1..=4 => Ok(usize::from(lock) - 1),
            _ => Err(TaskError::InvalidLockId(lock)),
        }
    }

    /// Take lock `1..=4`. Fails if it is already held.
    pub fn lock(&mut self, id: TaskId, lock: u8) -> Result<(), TaskError> {
        if self.try_lock(id, lock)? {
            Ok(())
        } else {
            Err(TaskError::LockReentry { task: id, lock })
        }
    }

    pub fn try_lock(&mut self, id: TaskId, lock: u8) -> Result<bool, TaskError> {
        let index = Self::lock_index(lock)?;
        let locks = &mut self.node_mut(id).run.locks;
        if locks[index] {
            return Ok(false);
        }
        locks[index] = true;
        Ok(true)
    }

    pub fn unlock(&mut self, id: TaskId, lock: u8) -> Result<(), TaskError> {
        let index = Self::lock_index(lock)?;
        let locks = &mut self.node_mut(id).run.locks;
        if !locks[index] {
            return Err(TaskError::LockNotHeld { task: id, lock });
        }
        locks[index] = false;
        Ok(())
    }

    pub fn is_locked(&self, id: TaskId, lock: u8) -> Result<bool, TaskError> {
        let index = Self::lock_index(lock)?;
        Ok(self.node(id).run.locks[index])
    }
}

impl<B: 'static> Default for TaskTree<B> {
    fn default() -> Self {
        Self::new()
    }
}
