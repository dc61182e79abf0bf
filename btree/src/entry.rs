//! The root of a task tree and its tick entry point.
//!
//! `TaskEntry` owns the arena, the blackboard, the root cancel token and the
//! frame counter. The entry itself is a node with a single child (the root
//! task) so the root is driven through the same template methods as any other
//! child.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::core::task::{Task, TaskCtx};
use crate::core::tree::TaskTree;
use crate::core::types::{ChildLayout, TaskId};
use crate::error::TaskError;
use crate::io::config::EngineConfig;
use crate::loader::TreeLoader;
use crate::status::Status;

/// Called with the tree and the entry's final status whenever the root completes.
pub type CompletionHandler<B> = Rc<dyn Fn(&TaskTree<B>, Status)>;

struct EntryTask<B: 'static> {
    handler: RefCell<Option<CompletionHandler<B>>>,
}

impl<B: 'static> Task<B> for EntryTask<B> {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        match ctx.first_child() {
            Some(root) => ctx.run_child(root),
            None => ctx.set_failed(Status::CHILDLESS),
        }
    }

    /// Only a completing root resets the token and reaches the handler; a
    /// `stop` of the entry does neither.
    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        ctx.set_completed(status, true);
        if let Some(token) = ctx.cancel_token() {
            token.reset();
        }
        let handler = self.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(ctx.tree(), ctx.status());
        }
    }

    fn can_handle_event(&self, ctx: &TaskCtx<'_, B>, _event: &dyn Any) -> bool {
        ctx.is_running() || ctx.blackboard().is_some()
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        if let Some(root) = ctx.first_child() {
            ctx.dispatch_event(root, event);
        }
    }

    fn reset_for_restart(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(token) = ctx.cancel_token() {
            token.reset();
        }
    }
}

pub struct TaskEntry<B: 'static> {
    tree: TaskTree<B>,
    entry: TaskId,
    name: Option<String>,
}

impl<B: 'static> TaskEntry<B> {
    pub fn new(blackboard: B) -> Self {
        let mut tree = TaskTree::new();
        let entry = tree.insert(EntryTask {
            handler: RefCell::new(None),
        });
        tree.set_blackboard(entry, Some(Rc::new(RefCell::new(blackboard))));
        tree.set_cancel_token(entry, Some(CancelToken::new()));
        // The root observes cancellation itself and reports back as a child.
        tree.flags_mut(entry).disable_auto_check_cancel = true;
        tree.entry = Some(entry);
        Self {
            tree,
            entry,
            name: None,
        }
    }

    /// New entry using the `[entry]` section of `config`.
    ///
    /// `disable_auto_check_cancel` stays set on the entry node whatever the
    /// config says.
    pub fn with_config(blackboard: B, config: &EngineConfig) -> Self {
        let mut entry = Self::new(blackboard);
        *entry.tree.flags_mut(entry.entry) = config.entry.flags;
        entry.tree.flags_mut(entry.entry).disable_auto_check_cancel = true;
        entry.tree.frame = config.run.start_frame;
        entry
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.tree.set_name(self.entry, name);
    }

    /// The entry node.
    pub fn id(&self) -> TaskId {
        self.entry
    }

    pub fn tree(&self) -> &TaskTree<B> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TaskTree<B> {
        &mut self.tree
    }

    pub fn root(&self) -> Option<TaskId> {
        self.tree.first_child(self.entry)
    }

    /// Install `root` as the root task, detaching any previous one.
    pub fn set_root(&mut self, root: TaskId) -> Result<(), TaskError> {
        if self.tree.is_running(self.entry) {
            return Err(TaskError::TaskRunning(self.entry));
        }
        match self.root() {
            Some(_) => self.tree.set_child(self.entry, 0, root).map(|_| ()),
            None => self.tree.add_child(self.entry, root).map(|_| ()),
        }
    }

    pub fn blackboard(&self) -> Rc<RefCell<B>> {
        self.tree
            .blackboard(self.entry)
            .unwrap_or_else(|| unreachable!("entry always owns a blackboard"))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.tree
            .cancel_token(self.entry)
            .unwrap_or_else(|| unreachable!("entry always owns a cancel token"))
    }

    /// Root-level shared read-only props.
    pub fn set_shared_props(&mut self, props: Option<Rc<dyn Any>>) {
        self.tree.set_shared_props(self.entry, props);
    }

    pub fn entity(&self) -> Option<Rc<dyn Any>> {
        self.tree.entity()
    }

    pub fn set_entity(&mut self, entity: Option<Rc<dyn Any>>) {
        self.tree.set_entity(entity);
    }

    pub fn set_loader(&mut self, loader: Rc<dyn TreeLoader<B>>) {
        self.tree.set_loader(loader);
    }

    pub fn set_handler(&mut self, handler: Option<CompletionHandler<B>>) {
        if let Some(task) = self.tree.task::<EntryTask<B>>(self.entry) {
            *task.handler.borrow_mut() = handler;
        }
    }

    pub fn cur_frame(&self) -> u32 {
        self.tree.cur_frame()
    }

    pub fn status(&self) -> Status {
        self.tree.status(self.entry)
    }

    pub fn is_running(&self) -> bool {
        self.tree.is_running(self.entry)
    }

    /// Has a root task to run. Blackboard and cancel token are always owned.
    pub fn is_inited(&self) -> bool {
        self.root().is_some()
    }

    /// Advance to `frame` and tick the tree. Returns the entry's status.
    ///
    /// Frames must not go backwards between resets.
    pub fn update(&mut self, frame: u32) -> Status {
        if frame < self.tree.frame {
            warn!(frame, current = self.tree.frame, "frame went backwards");
        }
        self.tree.frame = frame;
        self.tree.drain_cancel_inbox();
        if self.tree.is_running(self.entry) {
            self.tree.template_execute(self.entry);
        } else {
            self.tree.template_enter_execute(self.entry, None, false);
        }
        self.status()
    }

    /// Deliver an event to the tree outside the regular tick.
    pub fn on_event(&mut self, event: &dyn Any) {
        self.tree.drain_cancel_inbox();
        self.tree.dispatch_event(self.entry, event);
        self.tree.drain_cancel_inbox();
    }

    /// Cancel the root token. Auto-listening tasks react immediately; others
    /// at their next checkpoint.
    pub fn cancel(&mut self, code: i32) {
        let token = self.cancel_token();
        self.tree.cancel(&token, code);
    }

    /// Stop the whole tree without completing it normally.
    pub fn stop(&mut self) {
        self.tree.stop(self.entry);
    }

    /// Return the whole tree to NEW and the frame counter to 0.
    pub fn reset_for_restart(&mut self) {
        self.tree.reset_for_restart(self.entry);
        self.cancel_token().reset();
        self.tree.frame = 0;
        debug!(entry = ?self.name, "entry reset");
    }
}
