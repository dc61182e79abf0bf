//! Hierarchical state machines.
//!
//! A [`StateMachine`] runs one state (any task) at a time. Transitions are
//! requested with [`StateMachine::change_state`] or from inside the tree with a
//! [`ChangeStateTask`], which finds its machine through
//! [`find_state_machine`].

mod args;
mod change_state;
mod machine;
mod registry;

pub use args::{ChangeStateArgs, DelayMode, StateCommand};
pub use change_state::ChangeStateTask;
pub use machine::{StateChange, StateListener, StateMachine, StateMachineHandler};
pub use registry::StateMachineRegistry;

use crate::core::tree::TaskTree;
use crate::core::types::TaskId;
use crate::error::TaskError;

/// The state machine `task` should address.
///
/// A named machine registered in the tree wins. Otherwise the walk goes up
/// the control chain: without a name the first hit is a machine control or a
/// machine eldest sibling; with a name, a control or any sibling carrying that
/// name.
pub fn find_state_machine<B: 'static>(
    tree: &TaskTree<B>,
    task: TaskId,
    name: Option<&str>,
) -> Result<TaskId, TaskError> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    if let Some(machine) = name.and_then(|name| tree.state_machines().get(name)) {
        return Ok(machine);
    }
    let matches = |id: TaskId| match tree.task::<StateMachine<B>>(id) {
        Some(machine) => name.is_none_or(|name| machine.name() == Some(name)),
        None => false,
    };
    let mut current = task;
    while let Some(control) = tree.control(current) {
        if matches(control) {
            return Ok(control);
        }
        let found = match name {
            None => tree.first_child(control).filter(|&eldest| matches(eldest)),
            Some(_) => tree.children(control).iter().copied().find(|&sibling| matches(sibling)),
        };
        if let Some(machine) = found {
            return Ok(machine);
        }
        current = control;
    }
    Err(TaskError::StateMachineNotFound {
        task,
        name: name.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{Join, Sequence};
    use crate::entry::TaskEntry;
    use crate::test_support::Scripted;

    /// A task inside a state finds the machine through its control chain.
    #[test]
    fn finds_enclosing_machine() {
        let mut entry = TaskEntry::new(());
        let tree = entry.tree_mut();
        let machine = tree.insert(StateMachine::new());
        let state = tree.insert(Sequence::new());
        let leaf = tree.insert(Scripted::running());
        tree.add_child(state, leaf).expect("leaf");
        StateMachine::set_init_state(tree, machine, state).expect("init");
        entry.set_root(machine).expect("root");
        entry.update(1);

        assert_eq!(find_state_machine(entry.tree(), leaf, None).expect("found"), machine);
        let err = find_state_machine(entry.tree(), leaf, Some("missing")).expect_err("no name");
        assert!(matches!(err, TaskError::StateMachineNotFound { .. }));
    }

    /// Siblings are searched too, so a machine can be driven from a parallel branch.
    #[test]
    fn finds_named_sibling_machine() {
        let mut entry = TaskEntry::new(());
        let tree = entry.tree_mut();
        let join = tree.insert(Join::new());
        let driver = tree.insert(Sequence::new());
        let leaf = tree.insert(Scripted::running());
        tree.add_child(driver, leaf).expect("leaf");
        let machine = tree.insert(StateMachine::new().with_name("legs"));
        tree.add_child(join, driver).expect("driver");
        tree.add_child(join, machine).expect("machine");
        entry.set_root(join).expect("root");
        entry.update(1);

        entry.tree_mut().state_machines_mut().unregister("legs", machine);
        assert_eq!(
            find_state_machine(entry.tree(), leaf, Some("legs")).expect("found"),
            machine
        );
        assert!(find_state_machine(entry.tree(), leaf, None).is_err());
    }

    #[test]
    fn registry_lookup_ignores_structure() {
        let mut entry = TaskEntry::new(());
        let tree = entry.tree_mut();
        let lonely = tree.insert(Scripted::running());
        let machine = tree.insert(StateMachine::<()>::new());
        tree.state_machines_mut().register("global", machine);
        assert_eq!(
            find_state_machine(entry.tree(), lonely, Some("global")).expect("found"),
            machine
        );
    }
}
