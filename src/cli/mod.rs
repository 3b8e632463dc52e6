//! CLI argument parsing for oncefs.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// oncefs: run a step exactly once across hosts sharing a directory.
///
/// Coordination uses only atomic directory creation and marker files, so it
/// works on NFS and other shared filesystems without a lock service.
#[derive(Parser, Debug)]
#[command(name = "oncefs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log lock and holder details at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for oncefs.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command unless it already ran for this name.
    ///
    /// Exits 0 when the command succeeds here or succeeded earlier, 2 when
    /// it fails here, 3 when an earlier run failed, and 4 when the lock
    /// could not be acquired in time.
    Run(RunArgs),

    /// Remove the done/failed markers so the next run executes again.
    Clean(TargetArgs),

    /// Show the recorded state and current lock holder for a name.
    Status(TargetArgs),
}

/// Shared directory and operation name.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Shared base directory (created if missing by `run`).
    #[arg(short, long)]
    pub dir: PathBuf,

    /// Operation name; one path component.
    #[arg(short, long)]
    pub name: String,

    /// Config file (default: <dir>/oncefs.yaml when present).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Seconds to wait for the lock; negative waits forever.
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// Seconds between lock attempts.
    #[arg(long)]
    pub poll_interval: Option<f64>,

    /// Seconds after which another host's lock is considered abandoned.
    #[arg(long)]
    pub stale_timeout: Option<f64>,

    /// Forget any previous result before running.
    #[arg(long)]
    pub clean: bool,

    /// Append the command's stdout and stderr to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Command to run; a single argument is split with shell quoting rules.
    #[arg(last = true, required = true)]
    pub cmd: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
