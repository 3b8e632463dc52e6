//! Crash-safe marker files.
//!
//! A marker is a small file whose existence records an outcome (`.done`,
//! `.failed`). Creation is durable: the file's data and the parent
//! directory's new entry are both fsynced before the marker counts as
//! written. Existence checks open the parent directory first, which makes an
//! NFS client revalidate its cached view of that directory.

use super::durable::{sync_dir, write_and_sync};
use crate::error::{OnceError, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Check whether `path` exists without trusting a cached `stat()`.
///
/// Any failure to open the parent or the file itself reads as "does not
/// exist". Nothing is created.
pub fn nfs_file_exists(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !revalidate_dir(parent) {
        return false;
    }

    File::open(path).is_ok()
}

#[cfg(unix)]
fn revalidate_dir(dir: &Path) -> bool {
    File::open(dir).is_ok()
}

// Opening a directory as a file needs backup semantics on Windows; listing it
// has the same revalidating effect.
#[cfg(not(unix))]
fn revalidate_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok()
}

/// Durably create a marker at `path` holding `content` (may be empty).
///
/// Returns only after both the file and its parent directory are synced.
pub fn create_marker(path: &Path, content: &str) -> Result<()> {
    write_and_sync(path, content.as_bytes())?;

    let parent = path.parent().ok_or_else(|| {
        OnceError::io(
            format!("marker path '{}' has no parent directory", path.display()),
            io::Error::from(io::ErrorKind::InvalidInput),
        )
    })?;
    sync_dir(parent)
}

/// Read a marker's content, or `None` if it cannot be read.
pub fn read_marker(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

/// Remove a marker, treating "already gone" as success.
pub fn remove_marker(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OnceError::io(
            format!("failed to remove marker '{}'", path.display()),
            e,
        )),
    }
}
