//! Nested composites driven through the public API.
//!
//! Each test builds a small tree by hand, ticks it through a `TaskEntry`,
//! and checks the root status together with what the leaves saw.

use btree::branch::{Join, JoinSelectorN, Selector, Sequence, ServiceParallel};
use btree::core::TaskTree;
use btree::core::types::TaskId;
use btree::decorator::{Inverter, Repeat};
use btree::entry::TaskEntry;
use btree::status::Status;
use btree::test_support::{Scripted, attach_all, run_to_completion, scripted};

fn link(tree: &mut TaskTree<()>, parent: TaskId, children: &[TaskId]) {
    tree.add_children(parent, children.iter().copied())
        .expect("attach children");
}

#[test]
fn selector_and_inverter_inside_sequence() {
    let mut entry = TaskEntry::new(());
    let tree = entry.tree_mut();
    let root = tree.insert(Sequence::new());
    let selector = tree.insert(Selector::new());
    let inverter = tree.insert(Inverter);
    link(tree, root, &[selector, inverter]);
    let options = attach_all(tree, selector, vec![Scripted::fail(), Scripted::succeed()]);
    let inverted = attach_all(tree, inverter, vec![Scripted::fail()]);
    entry.set_root(root).expect("set root");

    assert_eq!(entry.update(1), Status::SUCCESS);
    assert_eq!(entry.tree().status(options[0]), Status::ERROR);
    assert_eq!(entry.tree().status(options[1]), Status::SUCCESS);
    assert_eq!(entry.tree().status(inverted[0]), Status::ERROR);
    assert_eq!(entry.tree().status(inverter), Status::SUCCESS);
}

/// Completed children of a sequence are not re-entered while a later one runs.
#[test]
fn sequence_resumes_running_child() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let children = attach_all(
        entry.tree_mut(),
        root,
        vec![
            Scripted::succeed(),
            Scripted::running_then(Status::SUCCESS, 2),
            Scripted::succeed(),
        ],
    );
    entry.set_root(root).expect("set root");

    assert_eq!(run_to_completion(&mut entry, 10), Status::SUCCESS);
    assert_eq!(entry.cur_frame(), 3);
    assert_eq!(scripted(entry.tree(), children[0]).entries(), 1);
    assert_eq!(scripted(entry.tree(), children[1]).executions(), 3);
    assert_eq!(scripted(entry.tree(), children[2]).entries(), 1);
}

/// A repeat allowed several loops per frame finishes within one tick.
#[test]
fn repeat_loops_within_a_frame() {
    let mut entry = TaskEntry::new(());
    let root = entry
        .tree_mut()
        .insert(Repeat::new(3).with_max_loop_per_frame(5));
    let body = entry.tree_mut().insert(Sequence::new());
    link(entry.tree_mut(), root, &[body]);
    let leaves = attach_all(entry.tree_mut(), body, vec![Scripted::succeed()]);
    entry.set_root(root).expect("set root");

    assert_eq!(entry.update(1), Status::SUCCESS);
    assert_eq!(scripted(entry.tree(), leaves[0]).entries(), 3);
    let repeat = entry.tree().task::<Repeat>(root).expect("repeat");
    assert_eq!(repeat.count(), 3);
}

/// A join stops its remaining children once it is decided.
#[test]
fn decided_join_cancels_remaining_children() {
    let mut entry = TaskEntry::new(());
    let root = entry
        .tree_mut()
        .insert(Join::with_policy(JoinSelectorN::new(1, false)));
    let children = attach_all(
        entry.tree_mut(),
        root,
        vec![Scripted::running(), Scripted::running_then(Status::SUCCESS, 1)],
    );
    entry.set_root(root).expect("set root");

    assert_eq!(entry.update(1), Status::RUNNING);
    assert_eq!(entry.update(2), Status::SUCCESS);
    assert_eq!(entry.tree().status(children[0]), Status::CANCELLED);
    assert_eq!(scripted(entry.tree(), children[0]).exits(), 1);
}

/// Services restart underneath a primary that keeps running.
#[test]
fn service_parallel_under_sequence() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let parallel = entry.tree_mut().insert(ServiceParallel::new());
    link(entry.tree_mut(), root, &[parallel]);
    let children = attach_all(
        entry.tree_mut(),
        parallel,
        vec![Scripted::running_then(Status::SUCCESS, 2), Scripted::succeed()],
    );
    entry.set_root(root).expect("set root");

    assert_eq!(run_to_completion(&mut entry, 10), Status::SUCCESS);
    assert_eq!(scripted(entry.tree(), children[1]).entries(), 3);
}

/// After a restart the whole tree runs again from NEW.
#[test]
fn reset_for_restart_allows_a_second_run() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let children = attach_all(
        entry.tree_mut(),
        root,
        vec![Scripted::succeed(), Scripted::sequence(vec![Status::ERROR, Status::SUCCESS])],
    );
    entry.set_root(root).expect("set root");

    assert_eq!(entry.update(1), Status::ERROR);
    entry.reset_for_restart();
    assert_eq!(entry.status(), Status::NEW);
    assert_eq!(entry.tree().status(children[1]), Status::NEW);
    assert_eq!(entry.update(1), Status::SUCCESS);
    assert_eq!(scripted(entry.tree(), children[0]).entries(), 2);
}
