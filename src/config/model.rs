//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// File name looked up in the base directory when no config path is given.
pub const CONFIG_FILE_NAME: &str = "oncefs.yaml";

/// Lock timing configuration.
///
/// All values are seconds as floats so sub-second poll intervals can be
/// written directly (`poll_interval_secs: 0.05`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum seconds to wait for the lock; negative waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Seconds between acquisition attempts.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Seconds after which a lock held by another host is considered stale.
    /// Must exceed the longest legitimate run of the guarded step.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
        }
    }
}

pub(crate) fn default_timeout_secs() -> f64 {
    3600.0
}

pub(crate) fn default_poll_interval_secs() -> f64 {
    0.1
}

pub(crate) fn default_stale_timeout_secs() -> f64 {
    7200.0
}
