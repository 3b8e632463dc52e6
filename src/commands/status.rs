//! Implementation of the `oncefs status` command.
//!
//! Read-only: reports the marker state for a name and, when the lock
//! directory exists, who holds it and whether the holder looks abandoned.

use super::{guard_for, load_config};
use crate::cli::TargetArgs;
use crate::error::Result;
use crate::locks::inspect_lock;
use crate::once::CallOnce;

pub fn cmd_status(target: TargetArgs) -> Result<()> {
    let config = load_config(&target)?;
    let guard = guard_for(&target, &config)?;

    print!("{}", render_status(&guard));
    Ok(())
}

/// Human-readable status report for one name.
fn render_status(guard: &CallOnce) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name:  {}\n", guard.name()));
    out.push_str(&format!("Dir:   {}\n", guard.paths().base_dir.display()));
    out.push_str(&format!("State: {}\n", guard.state()));

    if let Some(info) = inspect_lock(&guard.paths().lock_path, guard.options()) {
        out.push_str(&format!("Lock:  {}\n", info));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::locks::HolderRecord;
    use std::fs;
    use tempfile::TempDir;

    fn guard(dir: &TempDir, name: &str) -> CallOnce {
        let target = TargetArgs {
            dir: dir.path().to_path_buf(),
            name: name.to_string(),
            config: None,
        };
        guard_for(&target, &Config::default()).unwrap()
    }

    #[test]
    fn test_status_not_started() {
        let temp_dir = TempDir::new().unwrap();
        let report = render_status(&guard(&temp_dir, "compile"));

        assert!(report.contains("Name:  compile"));
        assert!(report.contains("State: not started"));
        assert!(!report.contains("Lock:"));
    }

    #[test]
    fn test_status_reports_failure_text() {
        let temp_dir = TempDir::new().unwrap();
        let guard = guard(&temp_dir, "compile");
        guard
            .ensure_done(|| -> std::result::Result<(), String> { Err("elaboration failed".into()) })
            .unwrap_err();

        let report = render_status(&guard);
        assert!(report.contains("State: failed: elaboration failed"));
    }

    #[test]
    fn test_status_shows_lock_holder() {
        let temp_dir = TempDir::new().unwrap();
        let guard = guard(&temp_dir, "compile");
        let lock_path = &guard.paths().lock_path;
        fs::create_dir_all(lock_path).unwrap();
        let holder = HolderRecord {
            hostname: "farm-node-7".to_string(),
            pid: 4242,
            ..HolderRecord::current()
        };
        holder.write_to(lock_path).unwrap();

        let report = render_status(&guard);
        assert!(report.contains("State: running (holder: farm-node-7 pid 4242"));
        assert!(report.contains("Lock:"));
        assert!(report.contains("farm-node-7"));
    }
}
