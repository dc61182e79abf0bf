//! Completion rules for [`Join`](super::Join).
//!
//! A policy only decides. The join keeps the counters, calls the policy at
//! entry and after each child completion, and applies the status it returns.

use crate::status::Status;

/// Counters of the current run, updated before the policy is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinState {
    pub child_count: usize,
    pub completed_count: usize,
    pub succeeded_count: usize,
}

impl JoinState {
    pub fn is_all_child_completed(&self) -> bool {
        self.completed_count >= self.child_count
    }

    pub fn is_all_child_succeeded(&self) -> bool {
        self.succeeded_count >= self.child_count
    }
}

/// The child that just completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildOutcome {
    pub index: usize,
    pub status: Status,
}

/// Where a join sends an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRoute {
    Drop,
    FirstChild,
}

pub trait JoinPolicy {
    /// Clear per-run data before the join is entered.
    fn before_enter(&self) {}

    /// Clear per-run data when the join is reset.
    fn reset_for_restart(&self) {}

    /// Result known at entry (no children, impossible requirement), if any.
    fn enter(&self, join: &JoinState) -> Option<Status>;

    /// Result after `child` completed, if the join is decided.
    fn on_child_completed(&self, join: &JoinState, child: ChildOutcome) -> Option<Status>;

    fn on_event(&self, _join: &JoinState) -> EventRoute {
        EventRoute::Drop
    }
}

/// Succeeds when every child succeeds; the first failure fails the join with
/// the child's code. Default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinSequence;

impl JoinPolicy for JoinSequence {
    fn enter(&self, join: &JoinState) -> Option<Status> {
        (join.child_count == 0).then_some(Status::SUCCESS)
    }

    fn on_child_completed(&self, join: &JoinState, child: ChildOutcome) -> Option<Status> {
        if !child.status.is_succeeded() {
            Some(child.status)
        } else if join.is_all_child_completed() {
            Some(Status::SUCCESS)
        } else {
            None
        }
    }
}

/// Follows the first child: completes with its status as soon as it
/// completes. Events go to the first child.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinMain;

impl JoinPolicy for JoinMain {
    fn enter(&self, join: &JoinState) -> Option<Status> {
        (join.child_count == 0).then_some(Status::CHILDLESS)
    }

    fn on_child_completed(&self, _join: &JoinState, child: ChildOutcome) -> Option<Status> {
        (child.index == 0).then_some(child.status)
    }

    fn on_event(&self, _join: &JoinState) -> EventRoute {
        EventRoute::FirstChild
    }
}

/// Succeeds on the first success; fails once every child failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinSelector;

impl JoinPolicy for JoinSelector {
    fn enter(&self, join: &JoinState) -> Option<Status> {
        (join.child_count == 0).then_some(Status::CHILDLESS)
    }

    fn on_child_completed(&self, join: &JoinState, child: ChildOutcome) -> Option<Status> {
        if child.status.is_succeeded() {
            Some(Status::SUCCESS)
        } else if join.is_all_child_completed() {
            Some(Status::ERROR)
        } else {
            None
        }
    }
}

/// Succeeds once `required` children succeeded.
///
/// With `fail_fast` it fails as soon as the children still running cannot
/// make up the missing successes.
#[derive(Debug, Clone, Copy)]
pub struct JoinSelectorN {
    pub required: usize,
    pub fail_fast: bool,
}

impl JoinSelectorN {
    pub fn new(required: usize, fail_fast: bool) -> Self {
        Self {
            required,
            fail_fast,
        }
    }

    fn check_fail_fast(&self, join: &JoinState) -> bool {
        let remaining = join.child_count as i64 - join.completed_count as i64;
        let missing = self.required as i64 - join.succeeded_count as i64;
        self.fail_fast && remaining < missing
    }
}

impl Default for JoinSelectorN {
    fn default() -> Self {
        Self::new(1, false)
    }
}

impl JoinPolicy for JoinSelectorN {
    fn enter(&self, join: &JoinState) -> Option<Status> {
        if self.required == 0 {
            Some(Status::SUCCESS)
        } else if join.child_count == 0 {
            Some(Status::CHILDLESS)
        } else if self.check_fail_fast(join) {
            Some(Status::INSUFFICIENT_CHILD)
        } else {
            None
        }
    }

    fn on_child_completed(&self, join: &JoinState, _child: ChildOutcome) -> Option<Status> {
        if join.succeeded_count >= self.required {
            Some(Status::SUCCESS)
        } else if join.is_all_child_completed() || self.check_fail_fast(join) {
            Some(Status::ERROR)
        } else {
            None
        }
    }
}

/// Waits for every child and then succeeds, whatever they returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinWaitAll;

impl JoinPolicy for JoinWaitAll {
    fn enter(&self, join: &JoinState) -> Option<Status> {
        (join.child_count == 0).then_some(Status::SUCCESS)
    }

    fn on_child_completed(&self, join: &JoinState, _child: ChildOutcome) -> Option<Status> {
        join.is_all_child_completed().then_some(Status::SUCCESS)
    }
}
