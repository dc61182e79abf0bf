//! Named state machines reachable from anywhere in a tree.

use std::collections::HashMap;

use crate::core::types::TaskId;

/// Name → machine map held by the tree.
///
/// Named machines register themselves when they start running and unregister
/// when they exit, so a lookup only finds live machines. Applications may also
/// register machines by hand.
#[derive(Debug, Clone, Default)]
pub struct StateMachineRegistry {
    by_name: HashMap<String, TaskId>,
}

impl StateMachineRegistry {
    /// Register `machine` under `name`. Returns the machine it replaced.
    pub fn register(&mut self, name: &str, machine: TaskId) -> Option<TaskId> {
        self.by_name.insert(name.to_string(), machine)
    }

    /// Remove `name` if it still points at `machine`.
    pub fn unregister(&mut self, name: &str, machine: TaskId) -> bool {
        if self.by_name.get(name) == Some(&machine) {
            self.by_name.remove(name);
            true
        } else {
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
