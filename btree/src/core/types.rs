//! Plain data carried by every node in the arena.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle of a task inside its [`TaskTree`](crate::core::tree::TaskTree).
///
/// Handles are stable for the lifetime of the tree; nodes are never freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation token of a task run.
///
/// Bumped once when a task is entered and once when it exits (or is reset).
/// Holding the id returned at entry lets a caller ask, after running arbitrary
/// code, whether that run is still the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReentryId(u16);

impl ReentryId {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

/// User-set control-flow options, copied into the active options on entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFlags {
    /// Defer the first `execute` to the next tick.
    pub slow_start: bool,
    /// Always notify the control immediately, even from inside `execute`.
    pub disable_delay_notify: bool,
    /// Skip the cancel checks in the template methods.
    pub disable_auto_check_cancel: bool,
    /// Register with the cancel token for immediate cancellation.
    pub auto_listen_cancel: bool,
    /// Reset children before re-entering after a previous run.
    pub auto_reset_children: bool,
}

/// Transient per-run bits. Cleared on every entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunFlags {
    pub enter_execute: bool,
    pub executing: bool,
    /// Exited through `stop`; never notify the control about this run.
    pub stop_exit: bool,
    /// Completed without ever running.
    pub stillborn: bool,
    /// Run as a hook: completion is not reported to the control.
    pub disable_notify: bool,
    /// The control has been told about the completion.
    pub notified: bool,
    pub locks: [bool; LOCK_COUNT],
}

pub(crate) const LOCK_COUNT: usize = 4;

/// Where a context value came from.
#[derive(Debug, Clone, Default)]
pub enum ContextSlot<V> {
    #[default]
    Empty,
    /// Assigned explicitly; kept across exits.
    Own(V),
    /// Captured from the control at entry; released at exit.
    Inherited(V),
}

impl<V> ContextSlot<V> {
    pub fn get(&self) -> Option<&V> {
        match self {
            ContextSlot::Empty => None,
            ContextSlot::Own(v) | ContextSlot::Inherited(v) => Some(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ContextSlot::Empty)
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self, ContextSlot::Inherited(_))
    }

    /// Empty the slot if its value was inherited.
    pub(crate) fn release(&mut self) {
        if self.is_inherited() {
            *self = ContextSlot::Empty;
        }
    }
}

/// How many children a task kind can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildLayout {
    Leaf,
    Single,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Children {
    Leaf,
    Single(Option<TaskId>),
    Many(Vec<TaskId>),
}

impl Children {
    pub fn for_layout(layout: ChildLayout) -> Self {
        match layout {
            ChildLayout::Leaf => Children::Leaf,
            ChildLayout::Single => Children::Single(None),
            ChildLayout::Many => Children::Many(Vec::new()),
        }
    }

    pub fn as_slice(&self) -> &[TaskId] {
        match self {
            Children::Leaf | Children::Single(None) => &[],
            Children::Single(Some(child)) => std::slice::from_ref(child),
            Children::Many(children) => children,
        }
    }
}
