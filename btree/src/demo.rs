//! Demonstration trees shipped with the `btree` binary.
//!
//! Every tree runs over a [`Board`] and completes within a handful of frames,
//! so `btree run <name>` shows a full run.

use serde::Serialize;

use crate::branch::{ActiveSelector, Join, JoinWaitAll, Sequence};
use crate::core::task::TaskCtx;
use crate::core::tree::TaskTree;
use crate::core::types::TaskId;
use crate::decorator::Repeat;
use crate::error::fatal;
use crate::fsm::{ChangeStateTask, StateMachine};
use crate::io::config::StateMachineConfig;
use crate::leaf::{Action, Condition, WaitFrame};
use crate::loader::RegistryLoader;
use crate::status::Status;

/// Blackboard of the demo trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Board {
    pub steps: u32,
    pub energy: u32,
    pub scans: u32,
}

pub const TREE_NAMES: [&str; 4] = ["patrol", "selector", "join", "fsm"];

/// Loader with every demo tree registered under its name.
pub fn demo_loader(state_machine: &StateMachineConfig) -> RegistryLoader<Board> {
    let state_machine = state_machine.clone();
    let mut loader = RegistryLoader::new();
    loader
        .register_tree("patrol", patrol)
        .register_tree("selector", selector)
        .register_tree("join", join)
        .register_tree("fsm", move |tree: &mut TaskTree<Board>| fsm(tree, &state_machine));
    loader
}

fn attach(tree: &mut TaskTree<Board>, parent: TaskId, children: &[TaskId]) -> TaskId {
    if let Err(err) = tree.add_children(parent, children.iter().copied()) {
        fatal(err);
    }
    parent
}

/// Edit the blackboard and report `status`.
fn with_board(
    ctx: &mut TaskCtx<'_, Board>,
    update: impl FnOnce(&mut Board) -> Status,
) -> Status {
    match ctx.blackboard() {
        Some(board) => update(&mut board.borrow_mut()),
        None => Status::ERROR,
    }
}

fn step(tree: &mut TaskTree<Board>) -> TaskId {
    tree.insert_named(
        "step",
        Action::new(|ctx: &mut TaskCtx<'_, Board>| {
            with_board(ctx, |board| {
                board.steps += 1;
                Status::SUCCESS
            })
        }),
    )
}

/// Three rounds of wait-one-frame-then-step.
fn patrol(tree: &mut TaskTree<Board>) -> TaskId {
    let wait = tree.insert(WaitFrame::new(1));
    let step = step(tree);
    let round = tree.insert_named("round", Sequence::new());
    attach(tree, round, &[wait, step]);
    let repeat = tree.insert(Repeat::new(3));
    attach(tree, repeat, &[round])
}

/// Recharge until the sprint's guard lets it preempt the recharge.
fn selector(tree: &mut TaskTree<Board>) -> TaskId {
    let charged = tree.insert(Condition::new(|board: &Board| board.energy >= 3));
    let sprint = tree.insert_named(
        "sprint",
        Action::new(|ctx: &mut TaskCtx<'_, Board>| {
            with_board(ctx, |board| {
                board.steps += 2;
                board.energy = 0;
                Status::SUCCESS
            })
        }),
    );
    if let Err(err) = tree.set_guard(sprint, Some(charged)) {
        fatal(err);
    }
    let recharge = tree.insert_named(
        "recharge",
        Action::new(|ctx: &mut TaskCtx<'_, Board>| {
            with_board(ctx, |board| {
                board.energy += 1;
                Status::RUNNING
            })
        }),
    );
    let root = tree.insert(ActiveSelector::new());
    attach(tree, root, &[sprint, recharge])
}

/// A timer and a scanner side by side; done when both are.
fn join(tree: &mut TaskTree<Board>) -> TaskId {
    let timer = tree.insert(WaitFrame::new(2));
    let scan = tree.insert_named(
        "scan",
        Action::new(|ctx: &mut TaskCtx<'_, Board>| {
            with_board(ctx, |board| {
                board.scans += 1;
                if board.scans >= 3 {
                    Status::SUCCESS
                } else {
                    Status::RUNNING
                }
            })
        }),
    );
    let root = tree.insert(Join::with_policy(JoinWaitAll));
    attach(tree, root, &[timer, scan])
}

/// Idle for a frame, switch to walking, finish after three steps.
fn fsm(tree: &mut TaskTree<Board>, config: &StateMachineConfig) -> TaskId {
    let machine = tree.insert(StateMachine::from_config(config).with_name("legs"));

    let walk_step = tree.insert_named(
        "walk",
        Action::new(|ctx: &mut TaskCtx<'_, Board>| {
            with_board(ctx, |board| {
                board.steps += 1;
                if board.steps >= 3 {
                    Status::SUCCESS
                } else {
                    Status::RUNNING
                }
            })
        }),
    );
    let walking = tree.insert_named("walking", Sequence::new());
    attach(tree, walking, &[walk_step]);

    let wait = tree.insert(WaitFrame::new(1));
    let change = tree.insert(ChangeStateTask::to(walking).with_machine_name("legs"));
    let idle = tree.insert_named("idle", Sequence::new());
    attach(tree, idle, &[wait, change]);

    if let Err(err) = StateMachine::set_init_state(tree, machine, idle) {
        fatal(err);
    }
    machine
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::io::config::EngineConfig;
    use crate::loader::load_tree;
    use crate::test_support::run_to_completion;

    fn run(name: &str) -> (Status, Board, u32) {
        let loader = Rc::new(demo_loader(&EngineConfig::default().state_machine));
        let mut entry = load_tree(loader, name, Board::default()).expect("demo tree");
        let status = run_to_completion(&mut entry, 20);
        let board = entry.blackboard().borrow().clone();
        (status, board, entry.cur_frame())
    }

    #[test]
    fn every_name_is_registered() {
        let loader = demo_loader(&StateMachineConfig::default());
        for name in TREE_NAMES {
            assert!(loader.contains_tree(name), "{name}");
        }
        assert_eq!(loader.tree_names().len(), TREE_NAMES.len());
    }

    #[test]
    fn patrol_takes_three_rounds() {
        let (status, board, frame) = run("patrol");
        assert_eq!(status, Status::SUCCESS);
        assert_eq!(board.steps, 3);
        assert_eq!(frame, 6);
    }

    /// The sprint preempts the recharge once energy reaches 3.
    #[test]
    fn selector_sprints_when_charged() {
        let (status, board, frame) = run("selector");
        assert_eq!(status, Status::SUCCESS);
        assert_eq!(board.steps, 2);
        assert_eq!(board.energy, 0);
        assert_eq!(frame, 4);
    }

    #[test]
    fn join_waits_for_both_children() {
        let (status, board, frame) = run("join");
        assert_eq!(status, Status::SUCCESS);
        assert_eq!(board.scans, 3);
        assert_eq!(frame, 3);
    }

    #[test]
    fn fsm_walks_after_idling() {
        let (status, board, _) = run("fsm");
        assert_eq!(status, Status::SUCCESS);
        assert_eq!(board.steps, 3);
    }
}
