//! Holder record written into a held lock directory.

use crate::error::{OnceError, Result};
use crate::fs::write_and_sync;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the holder record inside a lock directory.
pub const HOLDER_FILE_NAME: &str = "holder.info";

/// Who holds a lock, and since when.
///
/// Serialized as `{"hostname": ..., "pid": ..., "timestamp": ...}` where
/// `timestamp` is fractional seconds since the Unix epoch. Missing fields
/// fall back to values that can never prove liveness (empty host, pid -1,
/// epoch 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderRecord {
    /// Host name of the lock holder.
    #[serde(default)]
    pub hostname: String,

    /// Process ID of the lock holder.
    #[serde(default = "unknown_pid")]
    pub pid: i64,

    /// Acquisition time, seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: f64,
}

fn unknown_pid() -> i64 {
    -1
}

impl HolderRecord {
    /// Describe the calling process, stamped with the current time.
    pub fn current() -> Self {
        Self {
            hostname: local_hostname(),
            pid: i64::from(std::process::id()),
            timestamp: epoch_secs(Utc::now()),
        }
    }

    /// Acquisition time as a `DateTime`, if the stored timestamp is representable.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.timestamp * 1_000_000.0) as i64)
    }

    /// Time elapsed since acquisition; zero if the timestamp lies in the future.
    pub fn age(&self) -> Duration {
        let secs = epoch_secs(Utc::now()) - self.timestamp;
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let secs = self.age().as_secs();
        let minutes = secs / 60;
        let hours = minutes / 60;
        let days = hours / 24;

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, secs % 60)
        } else {
            format!("{}s", secs)
        }
    }

    /// Whether the holder ran on `local_host`.
    pub fn is_local(&self, local_host: &str) -> bool {
        self.hostname == local_host
    }

    /// Whether `other` describes the same acquisition (host, pid, and time).
    ///
    /// Timestamps are compared with a millisecond tolerance because they
    /// pass through a JSON float.
    pub fn same_holder(&self, other: &HolderRecord) -> bool {
        self.hostname == other.hostname
            && self.pid == other.pid
            && (self.timestamp - other.timestamp).abs() < 1e-3
    }

    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| OnceError::Config(format!("failed to serialize holder record: {}", e)))
    }

    /// Durably write this record into `lock_dir`.
    pub fn write_to(&self, lock_dir: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_and_sync(&holder_path(lock_dir), json.as_bytes())
    }

    /// Read the record from `lock_dir`.
    ///
    /// `None` when the file is missing, half-written, or not valid JSON; the
    /// caller cannot tell these apart and must not treat any of them as a
    /// free lock.
    pub fn read_from(lock_dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(holder_path(lock_dir)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Path of the holder record for the lock at `lock_dir`.
pub fn holder_path(lock_dir: &Path) -> PathBuf {
    lock_dir.join(HOLDER_FILE_NAME)
}

/// Host name used to decide whether a holder is local.
pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
