//! Implementation of the `oncefs clean` command.
//!
//! Removes the done and failed markers for a name. Does not take the lock;
//! running `clean` while another process is inside `run` for the same name
//! can let that run's result be forgotten.

use super::{guard_for, load_config};
use crate::cli::TargetArgs;
use crate::error::Result;

pub fn cmd_clean(target: TargetArgs) -> Result<()> {
    let config = load_config(&target)?;
    let guard = guard_for(&target, &config)?;

    guard.clean()?;
    println!("Cleaned '{}' in {}", guard.name(), guard.paths().lock_dir.display());
    Ok(())
}
