//! Command implementations for oncefs.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the config resolution shared by all of them.

mod clean;
mod run;
mod status;

use crate::cli::{Command, TargetArgs};
use crate::config::Config;
use crate::error::Result;
use crate::once::CallOnce;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run::cmd_run(args),
        Command::Clean(target) => clean::cmd_clean(target),
        Command::Status(target) => status::cmd_status(target),
    }
}

/// Bind a guard for `target` using the lock options from `config`.
fn guard_for(target: &TargetArgs, config: &Config) -> Result<CallOnce> {
    Ok(CallOnce::new(&target.dir, &target.name)?.with_lock_options(config.lock_options()))
}

/// Resolve `--config`, `<dir>/oncefs.yaml`, or defaults.
fn load_config(target: &TargetArgs) -> Result<Config> {
    Config::resolve(&target.dir, target.config.as_deref())
}
