//! The call-once guard.

use super::paths::OncePaths;
use crate::error::{BoxError, OnceError, Result};
use crate::events::{Event, EventAction, SharedSink, default_sink};
use crate::fs::{create_marker, nfs_file_exists, read_marker, remove_marker};
use crate::locks::{DirLock, HolderRecord, LivenessProbe, LockOptions};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Placeholder used when a failure marker exists but cannot be read.
const UNREADABLE_FAILURE: &str = "<unreadable>";

/// What `ensure_done` observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// This caller ran the operation; carries its return value.
    Executed(T),
    /// A done marker already existed; the operation was not run.
    AlreadyDone,
}

impl<T> Outcome<T> {
    pub fn was_executed(&self) -> bool {
        matches!(self, Outcome::Executed(_))
    }
}

/// Observable state of a named operation, read from the filesystem.
#[derive(Debug, Clone, PartialEq)]
pub enum OnceState {
    /// No markers and no lock holder.
    NotStarted,
    /// No markers yet, but someone holds the lock.
    Running(Option<HolderRecord>),
    /// A done marker exists.
    Succeeded,
    /// A failed marker exists, with the recorded error text.
    Failed(String),
}

impl std::fmt::Display for OnceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnceState::NotStarted => write!(f, "not started"),
            OnceState::Running(Some(holder)) => write!(
                f,
                "running (holder: {} pid {}, for {})",
                holder.hostname,
                holder.pid,
                holder.age_string()
            ),
            OnceState::Running(None) => write!(f, "running"),
            OnceState::Succeeded => write!(f, "succeeded"),
            OnceState::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Runs an operation at most once across every process sharing `base_dir`.
///
/// The guard itself is stateless: everything it knows lives in the lock
/// directory and marker files, so coordination survives process restarts
/// and works across hosts on a shared filesystem.
///
/// ```no_run
/// use oncefs::once::CallOnce;
///
/// let guard = CallOnce::new("/shared/sim_build", "hdl_compile")?;
/// guard.ensure_done(|| -> Result<(), std::io::Error> {
///     // expensive, side-effecting build step
///     Ok(())
/// })?;
/// # Ok::<(), oncefs::error::OnceError>(())
/// ```
#[derive(Clone)]
pub struct CallOnce {
    name: String,
    paths: OncePaths,
    options: LockOptions,
    sink: SharedSink,
    probe: Option<Arc<dyn LivenessProbe>>,
}

impl std::fmt::Debug for CallOnce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOnce")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CallOnce {
    /// Bind an operation name to a shared base directory.
    pub fn new(base_dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let paths = OncePaths::new(base_dir.into(), &name)?;
        Ok(Self {
            name,
            paths,
            options: LockOptions::default(),
            sink: default_sink(),
            probe: None,
        })
    }

    /// Set the lock acquisition timeout; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Replace all lock parameters.
    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Report transitions to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the local process liveness probe used for stale locks.
    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &OncePaths {
        &self.paths
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Run `op` unless it already ran to completion or failure.
    ///
    /// Under the lock for this name: a done marker means success without
    /// running; a failed marker surfaces the recorded error without running;
    /// otherwise `op` runs and its outcome is durably recorded before the
    /// lock is released. Failures are sticky until [`CallOnce::clean`].
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome::Executed(value))` - `op` ran here and succeeded
    /// * `Ok(Outcome::AlreadyDone)` - An earlier run succeeded
    /// * `Err(OnceError::Operation)` - `op` ran here and failed; displays as its error
    /// * `Err(OnceError::PriorFailure)` - An earlier run failed
    /// * `Err(OnceError::LockTimeout)` - Another caller held the lock past the timeout
    /// * `Err(OnceError::Io)` - Directories or markers could not be created
    pub fn ensure_done<T, E, F>(&self, op: F) -> Result<Outcome<T>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        self.ensure_dirs()?;

        let guard = self.lock().acquire()?;
        let result = self.run_locked(op);
        guard.release();
        result
    }

    /// Remove both markers so the next `ensure_done` runs the operation again.
    ///
    /// Does not take the lock. Calling this while another caller is inside
    /// `ensure_done` for the same name is the caller's mistake to avoid.
    pub fn clean(&self) -> Result<()> {
        remove_marker(&self.paths.done_file)?;
        remove_marker(&self.paths.fail_file)?;
        Ok(())
    }

    /// Read the current state without taking the lock.
    pub fn state(&self) -> OnceState {
        if nfs_file_exists(&self.paths.done_file) {
            return OnceState::Succeeded;
        }
        if nfs_file_exists(&self.paths.fail_file) {
            return OnceState::Failed(self.recorded_failure());
        }
        if nfs_file_exists(&self.paths.lock_path) {
            return OnceState::Running(HolderRecord::read_from(&self.paths.lock_path));
        }
        OnceState::NotStarted
    }

    fn lock(&self) -> DirLock {
        let lock = DirLock::new(&self.paths.lock_path, self.options).with_sink(self.sink.clone());
        match &self.probe {
            Some(probe) => lock.with_probe(probe.clone()),
            None => lock,
        }
    }

    fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.paths.base_dir, &self.paths.lock_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                OnceError::io(format!("failed to create directory '{}'", dir.display()), e)
            })?;
        }
        Ok(())
    }

    fn run_locked<T, E, F>(&self, op: F) -> Result<Outcome<T>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        if nfs_file_exists(&self.paths.done_file) {
            self.emit(EventAction::AlreadyDone, json!({}));
            return Ok(Outcome::AlreadyDone);
        }

        if nfs_file_exists(&self.paths.fail_file) {
            let message = self.recorded_failure();
            self.emit(EventAction::PriorFailure, json!({"error": message}));
            return Err(OnceError::PriorFailure {
                name: self.name.clone(),
                message,
            });
        }

        self.emit(
            EventAction::OperationStarted,
            json!({"base_dir": self.paths.base_dir.display().to_string()}),
        );

        match op() {
            Ok(value) => {
                create_marker(&self.paths.done_file, "")?;
                self.emit(EventAction::OperationSucceeded, json!({}));
                Ok(Outcome::Executed(value))
            }
            Err(e) => {
                let source: BoxError = e.into();
                let message = source.to_string();
                if let Err(marker_err) = create_marker(&self.paths.fail_file, &message) {
                    tracing::error!(
                        operation = %self.name,
                        error = %message,
                        "operation failed and the failure could not be recorded"
                    );
                    return Err(marker_err);
                }
                self.emit(EventAction::OperationFailed, json!({"error": message}));
                Err(OnceError::Operation {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    fn recorded_failure(&self) -> String {
        read_marker(&self.paths.fail_file).unwrap_or_else(|| UNREADABLE_FAILURE.to_string())
    }

    fn emit(&self, action: EventAction, details: serde_json::Value) {
        self.sink
            .record(&Event::new(action, self.name.clone()).with_details(details));
    }
}

/// Run `op` at most once for `name` under `base_dir`.
///
/// `timeout` bounds lock acquisition; `None` waits forever.
pub fn ensure_done<T, E, F>(
    base_dir: &Path,
    name: &str,
    op: F,
    timeout: Option<Duration>,
) -> Result<Outcome<T>>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    CallOnce::new(base_dir, name)?
        .with_timeout(timeout)
        .ensure_done(op)
}

/// Remove the markers for `name` under `base_dir`.
pub fn clean(base_dir: &Path, name: &str) -> Result<()> {
    CallOnce::new(base_dir, name)?.clean()
}
