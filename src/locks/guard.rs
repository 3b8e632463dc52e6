//! RAII lock guard implementation.

use super::holder::{HolderRecord, holder_path};
use crate::events::{Event, EventAction, SharedSink};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// RAII guard for a held lock directory.
///
/// When dropped, the holder record and the lock directory are removed.
/// Cleanup failures are logged as warnings and never panic.
pub struct LockGuard {
    /// Path to the lock directory.
    path: PathBuf,

    /// The record this guard wrote on acquisition.
    holder: HolderRecord,

    sink: SharedSink,

    /// Whether the lock has been released manually.
    released: bool,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .field("holder", &self.holder)
            .field("released", &self.released)
            .finish()
    }
}

impl LockGuard {
    pub(super) fn new(path: PathBuf, holder: HolderRecord, sink: SharedSink) -> Self {
        Self {
            path,
            holder,
            sink,
            released: false,
        }
    }

    /// Get the path to the lock directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The holder record written for this acquisition.
    pub fn holder(&self) -> &HolderRecord {
        &self.holder
    }

    /// Release the lock now instead of at the end of scope.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // If a stale-breaker removed our lock and someone else now holds it,
        // their directory is not ours to delete.
        if let Some(current) = HolderRecord::read_from(&self.path)
            && !current.same_holder(&self.holder)
        {
            tracing::warn!(
                lock = %self.path.display(),
                holder_host = %current.hostname,
                holder_pid = current.pid,
                "lock was taken over by another holder; leaving it in place"
            );
            return;
        }

        release_lock(&self.path);
        self.sink.record(&Event::new(
            EventAction::Released,
            self.path.display().to_string(),
        ));
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Remove the holder record and the lock directory at `path`.
///
/// Never fails: a lock that is already gone (for example broken by a stale
/// check) is fine, and other cleanup errors are logged and swallowed.
pub fn release_lock(path: &Path) {
    if let Err(e) = fs::remove_file(holder_path(path))
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(
            lock = %path.display(),
            error = %e,
            "failed to remove holder record"
        );
    }

    if let Err(e) = fs::remove_dir(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(
            lock = %path.display(),
            error = %e,
            "failed to remove lock directory"
        );
    }
}
