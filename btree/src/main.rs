//! `btree`: run the bundled demonstration trees frame by frame.
//!
//! Engine defaults come from `btree.toml` in the working directory (or
//! `--config`); a missing file means defaults.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use btree::demo::{Board, TREE_NAMES, demo_loader};
use btree::entry::TaskEntry;
use btree::exit_codes;
use btree::io::config::{EngineConfig, load_config, write_config};
use btree::loader::load_into;
use btree::logging;
use btree::status::Status;

const DEFAULT_CONFIG: &str = "btree.toml";

#[derive(Parser)]
#[command(name = "btree", version, about = "Frame-driven task tree runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the names of the bundled trees.
    List,
    /// Tick a bundled tree until it completes or the frame budget runs out.
    Run {
        /// Tree name (see `btree list`).
        tree: String,
        /// Frame budget; overrides `run.max_frames`.
        #[arg(short, long)]
        frames: Option<u32>,
        /// Engine config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// One JSON object per frame instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Validate and print the effective engine config.
    Config {
        /// Engine config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Write the effective config back to the file.
        #[arg(short, long)]
        write: bool,
    },
}

/// One line of `btree run --json`.
#[derive(Serialize)]
struct FrameReport<'a> {
    frame: u32,
    status: String,
    board: &'a Board,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::List => cmd_list(),
        Command::Run {
            tree,
            frames,
            config,
            json,
        } => cmd_run(&tree, frames, &config, json),
        Command::Config { config, write } => cmd_config(&config, write),
    }
}

fn cmd_list() -> Result<i32> {
    for name in TREE_NAMES {
        println!("{name}");
    }
    Ok(exit_codes::OK)
}

fn cmd_run(name: &str, frames: Option<u32>, config_path: &Path, json: bool) -> Result<i32> {
    let config = load_config(config_path)?;
    if !TREE_NAMES.contains(&name) {
        bail!("unknown tree {name:?}; expected one of {}", TREE_NAMES.join(", "));
    }
    let max_frames = frames.unwrap_or(config.run.max_frames);
    if max_frames == 0 {
        bail!("--frames must be > 0");
    }

    let loader = Rc::new(demo_loader(&config.state_machine));
    let entry = TaskEntry::with_config(Board::default(), &config);
    let mut entry = load_into(entry, loader, name).with_context(|| format!("load tree {name}"))?;

    let first = config.run.start_frame.saturating_add(1);
    let mut status = Status::NEW;
    for frame in first..first.saturating_add(max_frames) {
        status = entry.update(frame);
        report(frame, status, &entry.blackboard().borrow(), json)?;
        if status.is_completed() {
            break;
        }
    }

    if status.is_running() {
        info!(tree = name, frames = max_frames, "frame budget exhausted");
        entry.stop();
        return Ok(exit_codes::RUNNING);
    }
    Ok(outcome_code(status))
}

fn cmd_config(path: &Path, write: bool) -> Result<i32> {
    let config = load_config(path)?;
    if write {
        write_config(path, &config)?;
    }
    print!("{}", render_config(&config)?);
    Ok(exit_codes::OK)
}

fn report(frame: u32, status: Status, board: &Board, json: bool) -> Result<()> {
    if json {
        let line = FrameReport {
            frame,
            status: status.to_string(),
            board,
        };
        println!("{}", serde_json::to_string(&line).context("serialize frame report")?);
    } else {
        println!(
            "frame {frame}: {status} (steps={}, energy={}, scans={})",
            board.steps, board.energy, board.scans
        );
    }
    Ok(())
}

fn render_config(config: &EngineConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serialize config toml")
}

fn outcome_code(status: Status) -> i32 {
    if status.is_succeeded() {
        exit_codes::OK
    } else if status.is_completed() {
        exit_codes::FAILED
    } else {
        exit_codes::RUNNING
    }
}
