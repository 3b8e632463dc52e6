//! Path resolution for a call-once operation.
//!
//! All derived paths are computed once from the base directory and the
//! operation name; nothing here touches the filesystem.

use crate::error::{OnceError, Result};
use std::path::{Component, Path, PathBuf};

/// Directory under the base directory holding locks and markers.
pub const LOCKS_DIR_NAME: &str = ".locks";

/// Resolved paths for one named operation.
///
/// ```text
/// <base>/.locks/<name>.lock/             lock directory
/// <base>/.locks/<name>.lock/holder.info  holder record
/// <base>/.locks/<name>.done              success marker
/// <base>/.locks/<name>.failed            failure marker (error text)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OncePaths {
    /// Shared base directory.
    pub base_dir: PathBuf,

    /// `<base>/.locks`
    pub lock_dir: PathBuf,

    /// `<base>/.locks/<name>.lock`
    pub lock_path: PathBuf,

    /// `<base>/.locks/<name>.done`
    pub done_file: PathBuf,

    /// `<base>/.locks/<name>.failed`
    pub fail_file: PathBuf,
}

impl OncePaths {
    /// Resolve paths for `name` under `base_dir`.
    ///
    /// # Returns
    ///
    /// * `Ok(OncePaths)` - Name is usable as a single path component
    /// * `Err(OnceError::InvalidName)` - Empty, `.`/`..`, or contains a separator
    pub fn new<P: AsRef<Path>>(base_dir: P, name: &str) -> Result<Self> {
        validate_name(name)?;

        let base_dir = base_dir.as_ref().to_path_buf();
        let lock_dir = base_dir.join(LOCKS_DIR_NAME);

        Ok(Self {
            lock_path: lock_dir.join(format!("{}.lock", name)),
            done_file: lock_dir.join(format!("{}.done", name)),
            fail_file: lock_dir.join(format!("{}.failed", name)),
            lock_dir,
            base_dir,
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = || OnceError::InvalidName(name.to_string());

    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}
