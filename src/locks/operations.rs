//! Lock acquisition, scoped use, and inspection.

use super::guard::LockGuard;
use super::holder::{HolderRecord, local_hostname};
use super::liveness::{LivenessProbe, SignalProbe};
use super::options::LockOptions;
use super::release_lock;
use super::stale::StalePolicy;
use super::types::LockInfo;
use crate::error::{OnceError, Result};
use crate::events::{Event, EventAction, SharedSink, default_sink};
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// A cross-host lock backed by atomic directory creation.
///
/// The directory at `path` existing is the only thing that makes the lock
/// held. `mkdir` is atomic on every NFS version, unlike `flock`, which many
/// NFS setups only honour locally.
#[derive(Clone)]
pub struct DirLock {
    path: PathBuf,
    options: LockOptions,
    policy: StalePolicy,
    sink: SharedSink,
}

impl std::fmt::Debug for DirLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirLock")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DirLock {
    pub fn new(path: impl Into<PathBuf>, options: LockOptions) -> Self {
        Self {
            path: path.into(),
            options,
            policy: StalePolicy {
                local_host: local_hostname(),
                stale_timeout: options.stale_timeout,
                probe: Arc::new(SignalProbe),
            },
            sink: default_sink(),
        }
    }

    /// Report transitions to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the local process liveness probe.
    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.policy.probe = probe;
        self
    }

    /// Get the path to the lock directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Block until the lock directory is created by this caller.
    ///
    /// Each time the directory already exists, a stale holder is broken if
    /// possible and the create is retried immediately; otherwise the caller
    /// sleeps for the poll interval. There is no fairness among waiters.
    ///
    /// # Returns
    ///
    /// * `Ok(LockGuard)` - Lock held; released when the guard drops
    /// * `Err(OnceError::LockTimeout)` - Deadline passed; nothing was created
    /// * `Err(OnceError::Io)` - The directory or holder record could not be written
    pub fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                OnceError::io(
                    format!("failed to create lock parent '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let start = Instant::now();
        let deadline = self.options.timeout.and_then(|t| start.checked_add(t));

        loop {
            match fs::create_dir(&self.path) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.policy.try_break(&self.path, self.sink.as_ref()) {
                        continue;
                    }

                    let now = Instant::now();
                    let nap = match deadline {
                        Some(deadline) if now >= deadline => {
                            return Err(self.timed_out(now.duration_since(start)));
                        }
                        Some(deadline) => self.options.poll_interval.min(deadline - now),
                        None => self.options.poll_interval,
                    };
                    thread::sleep(nap);
                }
                Err(e) => {
                    return Err(OnceError::io(
                        format!("failed to create lock directory '{}'", self.path.display()),
                        e,
                    ));
                }
            }
        }

        let holder = HolderRecord::current();
        if let Err(e) = holder.write_to(&self.path) {
            release_lock(&self.path);
            return Err(e);
        }

        self.sink.record(
            &Event::new(EventAction::Acquired, self.path.display().to_string())
                .with_details(json!({"waited_ms": start.elapsed().as_millis() as u64})),
        );

        Ok(LockGuard::new(self.path.clone(), holder, self.sink.clone()))
    }

    /// Run `f` while holding the lock.
    ///
    /// The lock is released on every exit path, including a panic in `f`.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        let guard = self.acquire()?;
        let value = f();
        guard.release();
        Ok(value)
    }

    /// Describe the current holder, or `None` if the lock is free.
    pub fn inspect(&self) -> Option<LockInfo> {
        if !self.path.is_dir() {
            return None;
        }
        let holder = HolderRecord::read_from(&self.path);
        let staleness = self.policy.assess(holder.as_ref());
        Some(LockInfo {
            path: self.path.clone(),
            holder,
            staleness,
        })
    }

    fn timed_out(&self, waited: std::time::Duration) -> OnceError {
        self.sink.record(
            &Event::new(EventAction::TimedOut, self.path.display().to_string())
                .with_details(json!({"waited_ms": waited.as_millis() as u64})),
        );
        OnceError::LockTimeout {
            path: self.path.clone(),
            waited,
        }
    }
}

/// Acquire the lock at `path` with the given options.
pub fn acquire_lock(path: &Path, options: &LockOptions) -> Result<LockGuard> {
    DirLock::new(path, *options).acquire()
}

/// Acquire the lock at `path`, run `f`, and release.
pub fn with_lock<T>(path: &Path, options: &LockOptions, f: impl FnOnce() -> T) -> Result<T> {
    DirLock::new(path, *options).with_lock(f)
}

/// Describe the holder of the lock at `path`, or `None` if it is free.
pub fn inspect_lock(path: &Path, options: &LockOptions) -> Option<LockInfo> {
    DirLock::new(path, *options).inspect()
}
