//! Task outcome codes.
//!
//! A status is a small integer. The named codes below are the canonical subset;
//! any value `>= ERROR` that is not one of the named special codes is a
//! user-defined failure. Composites that only care about success, failure and
//! cancellation collapse codes with [`Status::normalize`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a task.
/// `Default` is `NEW`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Status(i32);

impl Status {
    /// Never entered, or reset since the last run.
    pub const NEW: Status = Status(0);
    /// Entered and not yet completed.
    pub const RUNNING: Status = Status(1);
    pub const SUCCESS: Status = Status(2);
    pub const CANCELLED: Status = Status(3);
    /// Generic failure; the minimum failure code.
    pub const ERROR: Status = Status(4);
    /// Precondition failed before entry. Renormalized to `ERROR` once passed to a parent.
    pub const GUARD_FAILED: Status = Status(5);
    /// A composite that needs children has none.
    pub const CHILDLESS: Status = Status(6);
    /// Not enough children to ever reach the required number of successes.
    pub const INSUFFICIENT_CHILD: Status = Status(7);
    pub const TIMEOUT: Status = Status(8);

    /// Largest status remembered as `prev_status`.
    pub const MAX_PREV_STATUS: Status = Status(63);

    pub const fn from_code(code: i32) -> Self {
        Status(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    /// Collapse into `{NEW, RUNNING, SUCCESS, CANCELLED, ERROR}`.
    pub fn normalize(self) -> Self {
        if self.0 < 0 {
            Status::NEW
        } else if self > Status::ERROR {
            Status::ERROR
        } else {
            self
        }
    }

    /// Map anything below `ERROR` to `ERROR`; failure codes pass through.
    pub fn to_failure(self) -> Self {
        if self < Status::ERROR { Status::ERROR } else { self }
    }

    pub fn is_running(self) -> bool {
        self == Status::RUNNING
    }

    /// Reached any terminal status.
    pub fn is_completed(self) -> bool {
        self >= Status::SUCCESS
    }

    pub fn is_succeeded(self) -> bool {
        self == Status::SUCCESS
    }

    pub fn is_cancelled(self) -> bool {
        self == Status::CANCELLED
    }

    pub fn is_failed(self) -> bool {
        self > Status::CANCELLED
    }

    pub fn is_failed_or_cancelled(self) -> bool {
        self >= Status::CANCELLED
    }

    /// Clamp into the range stored as `prev_status`.
    pub(crate) fn clamp_prev(self) -> Self {
        self.min(Status::MAX_PREV_STATUS).max(Status::NEW)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Status::NEW => write!(f, "NEW"),
            Status::RUNNING => write!(f, "RUNNING"),
            Status::SUCCESS => write!(f, "SUCCESS"),
            Status::CANCELLED => write!(f, "CANCELLED"),
            Status::ERROR => write!(f, "ERROR"),
            Status::GUARD_FAILED => write!(f, "GUARD_FAILED"),
            Status::CHILDLESS => write!(f, "CHILDLESS"),
            Status::INSUFFICIENT_CHILD => write!(f, "INSUFFICIENT_CHILD"),
            Status::TIMEOUT => write!(f, "TIMEOUT"),
            Status(code) => write!(f, "FAILED({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Special failure codes collapse into plain ERROR.
    #[test]
    fn normalize_collapses_failures() {
        assert_eq!(Status::GUARD_FAILED.normalize(), Status::ERROR);
        assert_eq!(Status::TIMEOUT.normalize(), Status::ERROR);
        assert_eq!(Status::from_code(42).normalize(), Status::ERROR);
        assert_eq!(Status::from_code(-3).normalize(), Status::NEW);
        assert_eq!(Status::CANCELLED.normalize(), Status::CANCELLED);
    }

    /// Non-failure codes become ERROR; failure codes keep their detail.
    #[test]
    fn to_failure_keeps_failure_detail() {
        assert_eq!(Status::SUCCESS.to_failure(), Status::ERROR);
        assert_eq!(Status::CANCELLED.to_failure(), Status::ERROR);
        assert_eq!(Status::TIMEOUT.to_failure(), Status::TIMEOUT);
    }

    #[test]
    fn predicates_follow_code_order() {
        assert!(!Status::RUNNING.is_completed());
        assert!(Status::SUCCESS.is_completed());
        assert!(!Status::CANCELLED.is_failed());
        assert!(Status::CANCELLED.is_failed_or_cancelled());
        assert!(Status::CHILDLESS.is_failed());
    }

    #[test]
    fn prev_status_is_clamped() {
        assert_eq!(Status::from_code(500).clamp_prev(), Status::MAX_PREV_STATUS);
        assert_eq!(Status::ERROR.clamp_prev(), Status::ERROR);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Status::CHILDLESS).expect("serialize");
        assert_eq!(json, "6");
    }
}
