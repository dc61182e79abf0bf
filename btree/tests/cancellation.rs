//! Cancellation from the root token down to running leaves.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use btree::branch::{Join, JoinWaitAll, Selector, Sequence};
use btree::cancel::{CancelCallback, CancelToken};
use btree::core::TaskTree;
use btree::entry::TaskEntry;
use btree::status::Status;
use btree::test_support::{Scripted, attach_all, scripted};

/// Plain leaves notice the cancel at the next tick and exit once.
#[test]
fn root_cancel_reaches_nested_leaf_at_next_tick() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let selector = entry.tree_mut().insert(Selector::new());
    entry.tree_mut().add_child(root, selector).expect("attach");
    let leaves = attach_all(entry.tree_mut(), selector, vec![Scripted::running()]);
    entry.set_root(root).expect("set root");

    assert_eq!(entry.update(1), Status::RUNNING);
    entry.cancel(6);
    assert_eq!(entry.status(), Status::RUNNING);

    assert_eq!(entry.update(2), Status::CANCELLED);
    assert_eq!(entry.tree().status(leaves[0]), Status::CANCELLED);
    assert_eq!(scripted(entry.tree(), leaves[0]).exits(), 1);
    assert!(!entry.cancel_token().is_cancelling());
}

/// An auto-listening leaf is cancelled during the `cancel` call itself.
#[test]
fn auto_listening_leaf_cancels_immediately() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let leaves = attach_all(entry.tree_mut(), root, vec![Scripted::running()]);
    entry.tree_mut().flags_mut(leaves[0]).auto_listen_cancel = true;
    entry.set_root(root).expect("set root");

    entry.update(1);
    entry.cancel(3);
    assert_eq!(entry.tree().status(leaves[0]), Status::CANCELLED);
    assert_eq!(entry.status(), Status::CANCELLED);
}

/// Join children listen on child tokens of the root token.
#[test]
fn cancel_spreads_through_join_child_tokens() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Join::with_policy(JoinWaitAll));
    let children = attach_all(
        entry.tree_mut(),
        root,
        vec![Scripted::running(), Scripted::running()],
    );
    entry.set_root(root).expect("set root");
    entry.update(1);

    let tokens: Vec<CancelToken> = children
        .iter()
        .map(|&child| entry.tree().cancel_token(child).expect("child token"))
        .collect();
    entry.cancel(2);
    assert!(tokens.iter().all(CancelToken::is_cancelling));
    assert!(tokens.iter().all(|token| token.code() == 2));

    assert_eq!(entry.update(2), Status::CANCELLED);
    for &child in &children {
        assert!(!entry.tree().is_running(child));
    }
}

#[test]
fn first_cancel_code_wins() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    attach_all(entry.tree_mut(), root, vec![Scripted::running()]);
    entry.set_root(root).expect("set root");
    entry.update(1);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let callback: CancelCallback = {
        let seen = Rc::clone(&seen);
        Rc::new(move |token: &CancelToken| seen.borrow_mut().push(token.code()))
    };
    entry.cancel_token().add_listener(callback);

    entry.cancel(5);
    entry.cancel(9);
    assert_eq!(*seen.borrow(), vec![5]);
    assert_eq!(entry.cancel_token().code(), 5);
}

/// The completion handler sees the cancelled status, and a reset tree runs again.
#[test]
fn handler_sees_cancel_and_reset_reruns() {
    let mut entry = TaskEntry::new(());
    let root = entry.tree_mut().insert(Sequence::new());
    let leaves = attach_all(
        entry.tree_mut(),
        root,
        vec![Scripted::sequence(vec![Status::RUNNING, Status::SUCCESS])],
    );
    entry.set_root(root).expect("set root");

    let finished = Rc::new(Cell::new(Status::NEW));
    {
        let finished = Rc::clone(&finished);
        entry.set_handler(Some(Rc::new(move |_tree: &TaskTree<()>, status: Status| {
            finished.set(status);
        })));
    }

    entry.update(1);
    entry.cancel(4);
    assert_eq!(entry.update(2), Status::CANCELLED);
    assert_eq!(finished.get(), Status::CANCELLED);

    entry.reset_for_restart();
    assert_eq!(entry.update(1), Status::SUCCESS);
    assert_eq!(finished.get(), Status::SUCCESS);
    assert_eq!(scripted(entry.tree(), leaves[0]).entries(), 2);
}
