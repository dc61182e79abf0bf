//! N-of-M convergence of children that all run concurrently.
//!
//! Every child gets its own child cancel token at entry, so a child can be
//! cancelled on its own while still observing the join's token. The token is
//! released as soon as the child completes, or when the join exits.

mod policy;

pub use policy::{
    ChildOutcome, EventRoute, JoinMain, JoinPolicy, JoinSelector, JoinSelectorN, JoinSequence,
    JoinState, JoinWaitAll,
};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::cancel::CancelToken;
use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::error::{TaskError, fatal};

pub struct Join {
    policy: Rc<dyn JoinPolicy>,
    /// Reentry id of each child before this run, to skip children already done.
    child_prev_rids: RefCell<Vec<ReentryId>>,
    child_tokens: RefCell<Vec<Option<CancelToken>>>,
    completed: Cell<usize>,
    succeeded: Cell<usize>,
}

impl Join {
    /// Join with the [`JoinSequence`] policy.
    pub fn new() -> Self {
        Self::with_policy(JoinSequence)
    }

    pub fn with_policy(policy: impl JoinPolicy + 'static) -> Self {
        Self {
            policy: Rc::new(policy),
            child_prev_rids: RefCell::new(Vec::new()),
            child_tokens: RefCell::new(Vec::new()),
            completed: Cell::new(0),
            succeeded: Cell::new(0),
        }
    }

    pub fn policy(&self) -> Rc<dyn JoinPolicy> {
        Rc::clone(&self.policy)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.get()
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.get()
    }

    pub fn is_all_child_succeeded(&self, child_count: usize) -> bool {
        self.succeeded.get() >= child_count
    }

    fn state(&self, child_count: usize) -> JoinState {
        JoinState {
            child_count,
            completed_count: self.completed.get(),
            succeeded_count: self.succeeded.get(),
        }
    }

    /// Give every child a fresh child token and remember its reentry id.
    fn record_context<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) {
        let Some(parent_token) = ctx.cancel_token() else {
            fatal(TaskError::MissingContext {
                task: ctx.id(),
                slot: "cancel token",
            });
        };
        let children = ctx.children();
        let mut rids = Vec::with_capacity(children.len());
        let mut tokens = Vec::with_capacity(children.len());
        for &child in &children {
            let token = parent_token.new_child();
            ctx.tree_mut().set_cancel_token(child, Some(token.clone()));
            rids.push(ctx.tree().reentry_id(child));
            tokens.push(Some(token));
        }
        *self.child_prev_rids.borrow_mut() = rids;
        *self.child_tokens.borrow_mut() = tokens;
    }

    fn release_token<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>, index: usize, child: TaskId) {
        let token = self
            .child_tokens
            .borrow_mut()
            .get_mut(index)
            .and_then(Option::take);
        let Some(token) = token else {
            return;
        };
        if let Some(parent_token) = ctx.cancel_token() {
            parent_token.unregister_child(&token);
        }
        token.reset();
        let owned = ctx
            .tree()
            .cancel_token(child)
            .is_some_and(|current| current.ptr_eq(&token));
        if owned {
            ctx.tree_mut().set_cancel_token(child, None);
        }
    }

    fn release_all_tokens<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) {
        for (index, child) in ctx.children().into_iter().enumerate() {
            self.release_token(ctx, index, child);
        }
        self.child_tokens.borrow_mut().clear();
    }
}

impl Default for Join {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static> Task<B> for Join {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Many
    }

    fn before_enter(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.completed.set(0);
        self.succeeded.set(0);
        self.policy.before_enter();
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        self.record_context(ctx);
        if let Some(status) = self.policy.enter(&self.state(ctx.child_count())) {
            ctx.set_completed(status, false);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let children = ctx.children();
        if children.is_empty() {
            return;
        }
        let rid = ctx.reentry_id();
        for (index, &child) in children.iter().enumerate() {
            let prev = self.child_prev_rids.borrow().get(index).copied();
            let started = prev.is_some_and(|prev| ctx.tree().is_exited(child, prev));
            if started && ctx.tree().is_completed(child) {
                continue;
            }
            ctx.run_child(child);
            if ctx.check_cancel(rid) {
                return;
            }
        }
        if self.completed.get() >= children.len() {
            fatal(TaskError::IllegalState {
                task: ctx.id(),
                detail: "every child completed but the join policy reached no result".to_string(),
            });
        }
    }

    fn exit(&self, ctx: &mut TaskCtx<'_, B>) {
        self.release_all_tokens(ctx);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        self.completed.set(self.completed.get() + 1);
        if status.is_succeeded() {
            self.succeeded.set(self.succeeded.get() + 1);
        }
        let index = ctx.tree().index_child(ctx.id(), child).unwrap_or_else(|| {
            fatal(TaskError::IllegalState {
                task: ctx.id(),
                detail: format!("completed task {child} is not a child"),
            })
        });
        self.release_token(ctx, index, child);

        let outcome = ChildOutcome { index, status };
        if let Some(result) = self
            .policy
            .on_child_completed(&self.state(ctx.child_count()), outcome)
        {
            ctx.set_completed(result, true);
        }
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        match self.policy.on_event(&self.state(ctx.child_count())) {
            EventRoute::Drop => {}
            EventRoute::FirstChild => {
                if let Some(first) = ctx.first_child() {
                    ctx.dispatch_event(first, event);
                }
            }
        }
    }

    fn is_all_child_completed(&self, ctx: &TaskCtx<'_, B>) -> bool {
        self.completed.get() >= ctx.child_count()
    }

    fn reset_for_restart(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.completed.set(0);
        self.succeeded.set(0);
        self.child_prev_rids.borrow_mut().clear();
        self.child_tokens.borrow_mut().clear();
        self.policy.reset_for_restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::test_support::{Scripted, entry_with, scripted};

    /// Children advance side by side; the join ends when the last one succeeds.
    #[test]
    fn sequence_policy_waits_for_all() {
        let (mut entry, root, children) = entry_with::<(), _>(
            Join::new(),
            vec![Scripted::succeed(), Scripted::running_then(Status::SUCCESS, 1)],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        let join = entry.tree().task::<Join>(root).expect("join");
        assert_eq!(join.completed_count(), 1);

        assert_eq!(entry.update(2), Status::SUCCESS);
        assert_eq!(join.succeeded_count(), 2);
        assert!(join.is_all_child_succeeded(2));
        assert_eq!(scripted(entry.tree(), children[0]).entries(), 1);
    }

    #[test]
    fn default_policy_counts_three_successes() {
        let (mut entry, root, _) = entry_with::<(), _>(
            Join::new(),
            vec![
                Scripted::succeed(),
                Scripted::running_then(Status::SUCCESS, 2),
                Scripted::succeed(),
            ],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::RUNNING);
        assert_eq!(entry.update(3), Status::SUCCESS);
        let join = entry.tree().task::<Join>(root).expect("join");
        assert_eq!(join.completed_count(), 3);
        assert_eq!(join.succeeded_count(), 3);
        assert!(join.is_all_child_succeeded(3));
    }

    /// Each child owns a token derived from the join's; it is released on completion.
    #[test]
    fn child_tokens_are_scoped_and_released() {
        let (mut entry, root, children) = entry_with::<(), _>(
            Join::new(),
            vec![Scripted::succeed(), Scripted::running()],
        );
        entry.update(1);
        let join_token = entry.tree().cancel_token(root).expect("join token");
        assert!(entry.tree().cancel_token(children[0]).is_none());
        let running_token = entry.tree().cancel_token(children[1]).expect("child token");
        assert!(!running_token.ptr_eq(&join_token));

        entry.tree_mut().cancel(&running_token, 4);
        assert_eq!(entry.update(2), Status::CANCELLED);
        assert!(!join_token.is_cancelling());
    }

    #[test]
    fn main_policy_follows_first_child() {
        let (mut entry, _, children) = entry_with::<(), _>(
            Join::with_policy(JoinMain),
            vec![Scripted::running_then(Status::TIMEOUT, 1), Scripted::fail()],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.tree().status(children[1]), Status::ERROR);
        assert_eq!(entry.update(2), Status::TIMEOUT);
    }

    /// Failed children are not re-run while the join keeps waiting.
    #[test]
    fn completed_children_are_not_rerun() {
        let (mut entry, _, children) = entry_with::<(), _>(
            Join::with_policy(JoinWaitAll),
            vec![Scripted::fail(), Scripted::running_then(Status::SUCCESS, 2)],
        );
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.update(2), Status::RUNNING);
        assert_eq!(entry.update(3), Status::SUCCESS);
        assert_eq!(scripted(entry.tree(), children[0]).entries(), 1);
    }

    #[test]
    fn selector_n_reaches_required() {
        let (mut entry, _, children) = entry_with::<(), _>(
            Join::with_policy(JoinSelectorN::new(2, false)),
            vec![Scripted::succeed(), Scripted::fail(), Scripted::succeed(), Scripted::running()],
        );
        assert_eq!(entry.update(1), Status::SUCCESS);
        assert_eq!(entry.tree().status(children[3]), Status::NEW);
    }

    /// With `JoinMain` events reach only the first child.
    #[test]
    fn events_follow_policy_routing() {
        let (mut entry, _, children) = entry_with::<(), _>(
            Join::with_policy(JoinMain),
            vec![Scripted::running(), Scripted::running()],
        );
        entry.update(1);
        entry.on_event(&"tick");
        assert_eq!(scripted(entry.tree(), children[0]).events(), 1);
        assert_eq!(scripted(entry.tree(), children[1]).events(), 0);

        let (mut entry, _, children) =
            entry_with::<(), _>(Join::new(), vec![Scripted::running()]);
        entry.update(1);
        entry.on_event(&"tick");
        assert_eq!(scripted(entry.tree(), children[0]).events(), 0);
    }
}
