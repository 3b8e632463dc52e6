//! Durable write primitives.
//!
//! A plain buffered write is not a synchronization signal to other NFS
//! clients, so every write that another host may rely on goes through
//! `write_and_sync`. Creating a new directory entry mutates the parent
//! directory, which `sync_dir` flushes separately.

use crate::error::{OnceError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Create or truncate `path`, write `content`, and fsync the file.
///
/// The parent directory is not synced; callers that need the new entry
/// itself to survive a crash follow up with [`sync_dir`].
pub fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| OnceError::io(format!("failed to create '{}'", path.display()), e))?;

    if !content.is_empty() {
        file.write_all(content)
            .map_err(|e| OnceError::io(format!("failed to write '{}'", path.display()), e))?;
    }

    file.sync_all()
        .map_err(|e| OnceError::io(format!("failed to sync '{}'", path.display()), e))?;

    Ok(())
}

/// Flush a directory's metadata (new or removed entries) to stable storage.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<()> {
    let handle = File::open(dir).map_err(|e| {
        OnceError::io(format!("failed to open directory '{}'", dir.display()), e)
    })?;
    handle.sync_all().map_err(|e| {
        OnceError::io(format!("failed to sync directory '{}'", dir.display()), e)
    })
}

/// Directories cannot be opened for fsync on this platform; entry
/// durability is left to the filesystem.
#[cfg(not(unix))]
pub fn sync_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(OnceError::io(
            format!("failed to open directory '{}'", dir.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ))
    }
}
