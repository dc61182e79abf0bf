//! Engine configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::TaskFlags;
use crate::status::Status;

/// Engine defaults, editable by hand. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub entry: EntryConfig,
    pub state_machine: StateMachineConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EntryConfig {
    /// Control-flow flags applied to the entry node.
    pub flags: TaskFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Undo history length. 0 disables undo.
    pub undo_queue_size: usize,
    /// Redo history length. 0 disables redo.
    pub redo_queue_size: usize,
    /// Status of a machine that has neither a current nor a next state.
    pub none_child_status: Status,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            undo_queue_size: 0,
            redo_queue_size: 0,
            none_child_status: Status::SUCCESS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Tick budget for `btree run`.
    pub max_frames: u32,
    /// Frame counter value before the first tick.
    pub start_frame: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_frames: 100,
            start_frame: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run.max_frames == 0 {
            return Err(anyhow!("run.max_frames must be > 0"));
        }
        let status = self.state_machine.none_child_status;
        if status != Status::NEW && !status.is_completed() {
            return Err(anyhow!(
                "state_machine.none_child_status must be NEW or a terminal status, got {status}"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
