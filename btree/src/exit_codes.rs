//! Stable exit codes for `btree` commands.

/// Command succeeded, or the tree completed with SUCCESS.
pub const OK: i32 = 0;
/// Bad arguments, unknown tree, or an invalid config.
pub const INVALID: i32 = 1;
/// The tree completed with a failure code or was cancelled.
pub const FAILED: i32 = 2;
/// The frame budget ran out while the tree was still running.
pub const RUNNING: i32 = 3;
