//! Lock information structures.

use super::holder::HolderRecord;
use super::stale::Staleness;
use std::path::PathBuf;

/// Information about a held lock, for diagnostics.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock directory path.
    pub path: PathBuf,

    /// The holder record, if it could be read.
    pub holder: Option<HolderRecord>,

    /// Whether the holder looks abandoned from this process's point of view.
    pub staleness: Staleness,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.holder {
            Some(holder) => {
                let since = holder
                    .acquired_at()
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "unknown time".to_string());
                write!(
                    f,
                    "{} (holder: {} pid {}, since {}, age: {}, {})",
                    self.path.display(),
                    holder.hostname,
                    holder.pid,
                    since,
                    holder.age_string(),
                    self.staleness
                )
            }
            None => write!(
                f,
                "{} (holder record unreadable, {})",
                self.path.display(),
                self.staleness
            ),
        }
    }
}
