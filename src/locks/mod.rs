//! Cross-host advisory locking for oncefs.
//!
//! # Lock Directories
//!
//! A lock is a directory. Creating it with `mkdir` is the acquisition event;
//! `mkdir` either succeeds or fails with "already exists" atomically, even
//! on NFS, which is the one guarantee a shared filesystem reliably gives.
//! Removing it releases the lock.
//!
//! # Holder Record
//!
//! Right after acquisition the holder writes `holder.info` into the lock
//! directory as JSON:
//! - `hostname`: host of the holding process
//! - `pid`: process ID of the holder
//! - `timestamp`: acquisition time in seconds since the Unix epoch
//!
//! The record is metadata only. A lock directory with no readable record is
//! still held.
//!
//! # Stale Locks
//!
//! Contenders that find the lock held read the record. A same-host holder
//! whose pid is gone, or a remote holder older than the stale timeout, is
//! broken by removing the directory; the contender then retries `mkdir`.
//!
//! # RAII Guards
//!
//! Acquisition returns a [`LockGuard`] that releases the lock when dropped.
//! Release never fails; cleanup errors are logged.

mod guard;
pub mod holder;
pub mod liveness;
mod operations;
pub mod options;
pub mod stale;
mod types;


// Re-export public API
pub use guard::{LockGuard, release_lock};
pub use holder::HolderRecord;
pub use liveness::{Liveness, LivenessProbe, SignalProbe};
pub use operations::{DirLock, acquire_lock, inspect_lock, with_lock};
pub use options::{LockOptions, timeout_from_secs};
pub use stale::{StalePolicy, StaleReason, Staleness};
pub use types::LockInfo;
