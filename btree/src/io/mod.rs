//! I/O helpers for the `btree` binary. The kernel itself never touches the
//! filesystem.

pub mod config;
