//! Errors for structural misuse and kernel contract violations.
//!
//! Tree outcomes are [`Status`](crate::status::Status) values, never errors.
//! `TaskError` covers the two other cases:
//!
//! - Misuse of the structural API (attaching an owned task, bad lock id). These
//!   are returned as `Err` from the call that caused them.
//! - Contract violations detected mid-tick (a guard that did not resolve, a
//!   branch with no child left to run). These mean the tree itself is invalid;
//!   the kernel panics with the variant's message.

use thiserror::Error;

use crate::core::types::TaskId;
use crate::status::Status;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task is already owned by another task.
    #[error("task {child} is already attached to {parent}")]
    AlreadyAttached { child: TaskId, parent: TaskId },

    #[error("task {0} cannot be attached to itself")]
    SelfAttach(TaskId),

    #[error("leaf task {0} cannot have children")]
    LeafHasNoChildren(TaskId),

    /// A decorator holds at most one child.
    #[error("decorator {0} already has a child")]
    DecoratorOccupied(TaskId),

    #[error("child index {index} out of range for {parent} ({len} children)")]
    ChildIndexOutOfRange {
        parent: TaskId,
        index: usize,
        len: usize,
    },

    #[error("task {0} does not exist in this tree")]
    UnknownTask(TaskId),

    /// The operation requires a task that is not running.
    #[error("task {0} is running")]
    TaskRunning(TaskId),

    #[error("invalid lock id {0}, expected 1..=4")]
    InvalidLockId(u8),

    #[error("lock {lock} on {task} is already held")]
    LockReentry { task: TaskId, lock: u8 },

    #[error("lock {lock} on {task} is not held")]
    LockNotHeld { task: TaskId, lock: u8 },

    #[error("task {0} is not a state machine")]
    NotAStateMachine(TaskId),

    #[error("no state machine reachable from {task} (name: {name:?})")]
    StateMachineNotFound { task: TaskId, name: Option<String> },

    #[error("invalid change-state args: {0}")]
    InvalidChangeStateArgs(String),

    #[error("subtree not found: {0}")]
    SubtreeNotFound(String),

    #[error("loaded object is not a task: {0}")]
    NotATask(String),

    /// Context capture found no value to inherit.
    #[error("task {task} has no {slot} to inherit")]
    MissingContext { task: TaskId, slot: &'static str },

    #[error("illegal guard status {status} from guard {guard}")]
    IllegalGuardStatus { guard: TaskId, status: Status },

    #[error("illegal state in {task}: {detail}")]
    IllegalState { task: TaskId, detail: String },
}

impl TaskError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::AlreadyAttached { .. } => "already_attached",
            TaskError::SelfAttach(_) => "self_attach",
            TaskError::LeafHasNoChildren(_) => "leaf_has_no_children",
            TaskError::DecoratorOccupied(_) => "decorator_occupied",
            TaskError::ChildIndexOutOfRange { .. } => "child_index_out_of_range",
            TaskError::UnknownTask(_) => "unknown_task",
            TaskError::TaskRunning(_) => "task_running",
            TaskError::InvalidLockId(_) => "invalid_lock_id",
            TaskError::LockReentry { .. } => "lock_reentry",
            TaskError::LockNotHeld { .. } => "lock_not_held",
            TaskError::NotAStateMachine(_) => "not_a_state_machine",
            TaskError::StateMachineNotFound { .. } => "state_machine_not_found",
            TaskError::InvalidChangeStateArgs(_) => "invalid_change_state_args",
            TaskError::SubtreeNotFound(_) => "subtree_not_found",
            TaskError::NotATask(_) => "not_a_task",
            TaskError::MissingContext { .. } => "missing_context",
            TaskError::IllegalGuardStatus { .. } => "illegal_guard_status",
            TaskError::IllegalState { .. } => "illegal_state",
        }
    }
}

/// Abort the tick on a kernel contract violation.
#[track_caller]
pub(crate) fn fatal(err: TaskError) -> ! {
    panic!("{err}")
}
