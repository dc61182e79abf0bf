//! Cooperative, hierarchical cancellation.
//!
//! A [`CancelToken`] is a shared flag plus a list of listeners. Cancelling a
//! token cancels every child token created from it, runs callback listeners,
//! and queues auto-listening tasks into their tree's cancel inbox. The tree
//! drains the inbox at its next entry point (see `TaskTree::drain_cancel_inbox`).
//!
//! Tokens are cheap handles; clones share state.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::types::TaskId;

/// Tasks waiting for `on_cancel_requested`, owned by the tree.
pub(crate) type CancelInbox = RefCell<VecDeque<TaskId>>;

/// Callback run when a token is cancelled.
pub type CancelCallback = Rc<dyn Fn(&CancelToken)>;

/// Code used when a token is cancelled without an explicit one.
pub const DEFAULT_CANCEL_CODE: i32 = 1;

#[derive(Clone)]
enum Listener {
    Child(CancelToken),
    Task { task: TaskId, inbox: Weak<CancelInbox> },
    Callback(CancelCallback),
}

struct Inner {
    code: Cell<i32>,
    listeners: RefCell<Vec<Listener>>,
}

#[derive(Clone)]
pub struct CancelToken {
    inner: Rc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                code: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_cancelling(&self) -> bool {
        self.inner.code.get() != 0
    }

    /// Cancel code, or 0 when not cancelling.
    pub fn code(&self) -> i32 {
        self.inner.code.get()
    }

    /// Request cancellation. The first request wins; later ones are ignored.
    ///
    /// A code of 0 is replaced by [`DEFAULT_CANCEL_CODE`].
    pub fn cancel(&self, code: i32) {
        if self.is_cancelling() {
            return;
        }
        let code = if code == 0 { DEFAULT_CANCEL_CODE } else { code };
        self.inner.code.set(code);

        // Snapshot: listeners may register or unregister while we notify.
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            match listener {
                Listener::Child(child) => child.cancel(code),
                Listener::Task { task, inbox } => {
                    if let Some(inbox) = inbox.upgrade() {
                        inbox.borrow_mut().push_back(task);
                    }
                }
                Listener::Callback(callback) => callback(self),
            }
        }
    }

    /// Create a child token that is cancelled whenever this one is.
    ///
    /// The child can also be cancelled on its own without affecting this token.
    pub fn new_child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_cancelling() {
            child.cancel(self.code());
        } else {
            self.inner
                .listeners
                .borrow_mut()
                .push(Listener::Child(child.clone()));
        }
        child
    }

    /// Stop propagating to `child`. Returns whether it was registered.
    pub fn unregister_child(&self, child: &CancelToken) -> bool {
        self.remove_where(|l| matches!(l, Listener::Child(c) if c.ptr_eq(child)))
    }

    pub fn add_listener(&self, callback: CancelCallback) {
        self.inner
            .listeners
            .borrow_mut()
            .push(Listener::Callback(callback));
    }

    pub fn remove_listener(&self, callback: &CancelCallback) -> bool {
        self.remove_where(|l| matches!(l, Listener::Callback(c) if Rc::ptr_eq(c, callback)))
    }

    pub(crate) fn register_task(&self, task: TaskId, inbox: &Rc<CancelInbox>) {
        self.inner.listeners.borrow_mut().push(Listener::Task {
            task,
            inbox: Rc::downgrade(inbox),
        });
    }

    pub(crate) fn unregister_task(&self, task: TaskId) -> bool {
        self.remove_where(|l| matches!(l, Listener::Task { task: t, .. } if *t == task))
    }

    /// Clear the cancel code and drop every listener so the token can be reused.
    pub fn reset(&self) {
        self.inner.code.set(0);
        self.inner.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn ptr_eq(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn remove_where(&self, pred: impl Fn(&Listener) -> bool) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        match listeners.iter().position(pred) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("code", &self.code())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
