//! Built-in leaves.
//!
//! Business logic belongs to the application; these cover the structural
//! needs of a tree (constants, waiting, adapting closures).

use std::any::Any;

use crate::core::task::{Task, TaskCtx};
use crate::error::{TaskError, fatal};
use crate::status::Status;

/// Succeeds on its first tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Success;

impl<B: 'static> Task<B> for Success {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        ctx.set_success();
    }
}

/// Fails on its first tick with the configured code (mapped through `to_failure`).
#[derive(Debug, Clone, Copy)]
pub struct Failure {
    pub status: Status,
}

impl Failure {
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

impl Default for Failure {
    fn default() -> Self {
        Self::new(Status::ERROR)
    }
}

impl<B: 'static> Task<B> for Failure {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        ctx.set_failed(self.status.to_failure());
    }
}

/// Succeeds once it has been running for `required` frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitFrame {
    pub required: u32,
}

impl WaitFrame {
    pub fn new(required: u32) -> Self {
        Self { required }
    }
}

impl<B: 'static> Task<B> for WaitFrame {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        if ctx.run_frames() >= self.required {
            ctx.set_success();
        }
    }
}

type ActionFn<B> = Box<dyn Fn(&mut TaskCtx<'_, B>) -> Status>;

/// Leaf driven by a closure returning the status of each tick.
///
/// `RUNNING` keeps the task running; a terminal status completes it. `NEW` is
/// not a valid answer.
pub struct Action<B: 'static> {
    run: ActionFn<B>,
}

impl<B: 'static> Action<B> {
    pub fn new(run: impl Fn(&mut TaskCtx<'_, B>) -> Status + 'static) -> Self {
        Self { run: Box::new(run) }
    }
}

impl<B: 'static> Task<B> for Action<B> {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let rid = ctx.reentry_id();
        let status = (self.run)(ctx);
        if ctx.is_exited(rid) {
            return;
        }
        match status {
            Status::RUNNING => {}
            Status::NEW => fatal(TaskError::IllegalState {
                task: ctx.id(),
                detail: "action returned NEW".to_string(),
            }),
            status => ctx.set_completed(status, false),
        }
    }
}

type ConditionFn<B> = Box<dyn Fn(&B) -> bool>;

/// Leaf testing the blackboard: SUCCESS when the predicate holds, ERROR otherwise.
///
/// Completes in one tick, so it can serve as a guard.
pub struct Condition<B: 'static> {
    test: ConditionFn<B>,
}

impl<B: 'static> Condition<B> {
    pub fn new(test: impl Fn(&B) -> bool + 'static) -> Self {
        Self {
            test: Box::new(test),
        }
    }
}

impl<B: 'static> Task<B> for Condition<B> {
    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let passed = ctx
            .blackboard()
            .is_some_and(|blackboard| (self.test)(&blackboard.borrow()));
        if passed {
            ctx.set_success();
        } else {
            ctx.set_failed(Status::ERROR);
        }
    }

    fn can_handle_event(&self, _ctx: &TaskCtx<'_, B>, _event: &dyn Any) -> bool {
        false
    }
}
