//! Parameters of a state transition.

use std::any::Any;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// How a transition moves through the undo/redo history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCommand {
    /// A new state: the current one goes to the undo history, redo is cleared.
    #[default]
    None,
    /// Back to the last undo state; the current one goes to redo.
    Undo,
    /// Forward to the first redo state; the current one goes to undo.
    Redo,
}

/// When a requested transition is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayMode {
    /// Right away if the machine is running.
    #[default]
    None,
    /// Once the current state completes on its own.
    CurrentCompleted,
    /// From a given frame on.
    NextFrame,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeStateArgs {
    pub cmd: StateCommand,
    pub delay: DelayMode,
    /// Frame a `NextFrame` transition waits for. `None` means the next tick.
    pub frame: Option<u32>,
    /// Passed through to the machine's listener.
    pub extra: Option<Rc<dyn Any>>,
}

impl ChangeStateArgs {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn undo() -> Self {
        Self {
            cmd: StateCommand::Undo,
            ..Self::default()
        }
    }

    pub fn redo() -> Self {
        Self {
            cmd: StateCommand::Redo,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: DelayMode) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_extra(mut self, extra: Rc<dyn Any>) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn is_plain(&self) -> bool {
        self.cmd == StateCommand::None
    }

    pub fn is_undo(&self) -> bool {
        self.cmd == StateCommand::Undo
    }

    pub fn is_redo(&self) -> bool {
        self.cmd == StateCommand::Redo
    }

    /// Normalize for a machine that is (or is not) running at `cur_frame`.
    ///
    /// A stopped machine applies every request on its next run, so the delay
    /// is dropped; it cannot wait for a frame it knows nothing about. A
    /// running machine fills in the frame of a `NextFrame` request.
    pub fn checked(self, running: bool, cur_frame: u32) -> Result<Self, TaskError> {
        if !running {
            if self.delay == DelayMode::NextFrame {
                return Err(TaskError::InvalidChangeStateArgs(
                    "next-frame delay needs a running state machine".to_string(),
                ));
            }
            return Ok(self.with_delay(DelayMode::None));
        }
        if self.delay == DelayMode::NextFrame && self.frame.is_none() {
            return Ok(self.with_frame(cur_frame + 1));
        }
        Ok(self)
    }
}
