//! Lock acquisition parameters.

use std::time::Duration;

/// Default acquisition timeout: one hour.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default delay between acquisition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default age after which a lock held by another host may be broken.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(7200);

/// How long to wait for a lock, how often to retry, and when a remote
/// holder counts as abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Maximum time to wait; `None` waits forever.
    pub timeout: Option<Duration>,

    /// Sleep between attempts while the lock is held.
    pub poll_interval: Duration,

    /// Age beyond which a lock held from another host is stale. Must exceed
    /// any legitimate hold duration.
    pub stale_timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}

impl LockOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stale_timeout(mut self, stale_timeout: Duration) -> Self {
        self.stale_timeout = stale_timeout;
        self
    }
}

/// Convert a timeout in seconds to an optional deadline length.
///
/// Negative, infinite, or NaN values mean "wait forever".
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}
