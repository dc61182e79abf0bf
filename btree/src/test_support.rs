//! Test-only node kinds and helpers for building trees.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::cancel::CancelToken;
use crate::core::task::{Task, TaskCtx};
use crate::core::tree::TaskTree;
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::entry::TaskEntry;
use crate::status::Status;

/// Shared log of lifecycle lines such as `"enter a"` or `"exit a"`.
pub type Recorder = Rc<RefCell<Vec<String>>>;

pub fn recorder() -> Recorder {
    Rc::new(RefCell::new(Vec::new()))
}

/// Leaf that completes each run with a scripted status.
///
/// Run `n` uses `outcomes[n]`, the last outcome repeating once the script is
/// exhausted. `RUNNING` as an outcome never completes. With `delay` the task
/// stays running for that many ticks of a run before completing.
pub struct Scripted {
    outcomes: Vec<Status>,
    delay: u32,
    on_event: Option<Status>,
    label: Option<(String, Recorder)>,
    entries: Cell<u32>,
    executions: Cell<u32>,
    exits: Cell<u32>,
    events: Cell<u32>,
    ticks_in_run: Cell<u32>,
}

impl Scripted {
    pub fn sequence(outcomes: Vec<Status>) -> Self {
        assert!(!outcomes.is_empty(), "script needs at least one outcome");
        Self {
            outcomes,
            delay: 0,
            on_event: None,
            label: None,
            entries: Cell::new(0),
            executions: Cell::new(0),
            exits: Cell::new(0),
            events: Cell::new(0),
            ticks_in_run: Cell::new(0),
        }
    }

    pub fn with(status: Status) -> Self {
        Self::sequence(vec![status])
    }

    pub fn succeed() -> Self {
        Self::with(Status::SUCCESS)
    }

    pub fn fail() -> Self {
        Self::with(Status::ERROR)
    }

    pub fn running() -> Self {
        Self::with(Status::RUNNING)
    }

    /// Stay running for `ticks` executions, then complete with `status`.
    pub fn running_then(status: Status, ticks: u32) -> Self {
        Self {
            delay: ticks,
            ..Self::with(status)
        }
    }

    /// Complete with `status` when an event arrives while running.
    pub fn completing_on_event(mut self, status: Status) -> Self {
        self.on_event = Some(status);
        self
    }

    /// Append `"enter <name>"` / `"exit <name>"` / `"event <name>"` to `log`.
    pub fn logging(mut self, name: &str, log: &Recorder) -> Self {
        self.label = Some((name.to_string(), Rc::clone(log)));
        self
    }

    pub fn entries(&self) -> u32 {
        self.entries.get()
    }

    pub fn executions(&self) -> u32 {
        self.executions.get()
    }

    pub fn exits(&self) -> u32 {
        self.exits.get()
    }

    pub fn events(&self) -> u32 {
        self.events.get()
    }

    fn log(&self, what: &str) {
        if let Some((name, log)) = &self.label {
            log.borrow_mut().push(format!("{what} {name}"));
        }
    }

    fn outcome(&self) -> Status {
        let run = self.entries.get().saturating_sub(1) as usize;
        self.outcomes[run.min(self.outcomes.len() - 1)]
    }
}

impl<B: 'static> Task<B> for Scripted {
    fn enter(&self, _ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        self.entries.set(self.entries.get() + 1);
        self.ticks_in_run.set(0);
        self.log("enter");
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        self.executions.set(self.executions.get() + 1);
        let outcome = self.outcome();
        if outcome == Status::RUNNING {
            return;
        }
        let ticks = self.ticks_in_run.get() + 1;
        self.ticks_in_run.set(ticks);
        if ticks > self.delay {
            ctx.set_completed(outcome, false);
        }
    }

    fn exit(&self, _ctx: &mut TaskCtx<'_, B>) {
        self.exits.set(self.exits.get() + 1);
        self.log("exit");
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, _event: &dyn Any) {
        self.events.set(self.events.get() + 1);
        self.log("event");
        if let Some(status) = self.on_event {
            ctx.set_completed(status, false);
        }
    }
}

/// Branch that runs every unfinished child each tick and records notifications.
///
/// It never completes on its own, which makes it a neutral control for
/// exercising the kernel directly.
#[derive(Default)]
pub struct Probe {
    completed: RefCell<Vec<(TaskId, Status)>>,
    running: RefCell<Vec<TaskId>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> Vec<(TaskId, Status)> {
        self.completed.borrow().clone()
    }

    pub fn running(&self) -> Vec<TaskId> {
        self.running.borrow().clone()
    }
}

impl<B: 'static> Task<B> for Probe {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Many
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        let rid = ctx.reentry_id();
        for child in ctx.children() {
            if ctx.status_of(child).is_completed() {
                continue;
            }
            ctx.run_child(child);
            if ctx.check_cancel(rid) {
                return;
            }
        }
    }

    fn on_child_running(&self, _ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        self.running.borrow_mut().push(child);
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        self.completed.borrow_mut().push((child, status));
    }
}

/// Make `task` a root: own blackboard and cancel token, treated as the entry.
pub fn root_context<B: Default + 'static>(tree: &mut TaskTree<B>, task: TaskId) {
    tree.set_blackboard(task, Some(Rc::new(RefCell::new(B::default()))));
    tree.set_cancel_token(task, Some(CancelToken::new()));
    tree.entry = Some(task);
}

/// Insert `tasks` and attach them under `parent` in order.
pub fn attach_all<B: 'static, T: Task<B>>(
    tree: &mut TaskTree<B>,
    parent: TaskId,
    tasks: Vec<T>,
) -> Vec<TaskId> {
    tasks
        .into_iter()
        .map(|task| {
            let id = tree.insert(task);
            tree.add_child(parent, id).expect("attach child");
            id
        })
        .collect()
}

/// Build an entry around `root` and its scripted children.
pub fn entry_with<B: Default + 'static, T: Task<B>>(
    root: T,
    children: Vec<Scripted>,
) -> (TaskEntry<B>, TaskId, Vec<TaskId>) {
    let mut entry = TaskEntry::new(B::default());
    let root = entry.tree_mut().insert(root);
    let children = attach_all(entry.tree_mut(), root, children);
    entry.set_root(root).expect("set root");
    (entry, root, children)
}

/// Tick `entry` until it completes or `max_frames` ticks have run.
pub fn run_to_completion<B: 'static>(entry: &mut TaskEntry<B>, max_frames: u32) -> Status {
    let mut status = Status::NEW;
    for frame in 1..=max_frames {
        status = entry.update(frame);
        if status.is_completed() {
            break;
        }
    }
    status
}

/// Scripted counters of `id`.
pub fn scripted<B: 'static>(tree: &TaskTree<B>, id: TaskId) -> Rc<Scripted> {
    tree.task::<Scripted>(id).expect("scripted task")
}
