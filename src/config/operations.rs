//! Config loading, validation, and conversion to lock options.

use super::model::{CONFIG_FILE_NAME, Config};
use crate::error::{OnceError, Result};
use crate::locks::{LockOptions, timeout_from_secs};
use std::path::Path;
use std::time::Duration;

/// Smallest accepted poll interval; anything shorter spins on `mkdir`.
const MIN_POLL_INTERVAL_SECS: f64 = 0.001;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(OnceError::Config)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            OnceError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Resolve the config for a base directory.
    ///
    /// An explicit path must exist. Otherwise `<base_dir>/oncefs.yaml` is used
    /// when present, and defaults when not.
    pub fn resolve(base_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = base_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| OnceError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| OnceError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `poll_interval_secs` must be finite and at least 1 ms
    /// - `stale_timeout_secs` must be finite and greater than 0
    /// - `timeout_secs` must not be NaN (negative or infinite means wait forever)
    pub fn validate(&self) -> Result<()> {
        if !(self.poll_interval_secs.is_finite()
            && self.poll_interval_secs >= MIN_POLL_INTERVAL_SECS)
        {
            return Err(OnceError::Config(format!(
                "config validation failed: poll_interval_secs must be at least {} (found {})",
                MIN_POLL_INTERVAL_SECS, self.poll_interval_secs
            )));
        }

        if !(self.stale_timeout_secs.is_finite() && self.stale_timeout_secs > 0.0) {
            return Err(OnceError::Config(format!(
                "config validation failed: stale_timeout_secs must be greater than 0 (found {})",
                self.stale_timeout_secs
            )));
        }

        if self.timeout_secs.is_nan() {
            return Err(OnceError::Config(
                "config validation failed: timeout_secs must be a number".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert to lock options. Call [`Config::validate`] first.
    pub fn lock_options(&self) -> LockOptions {
        let defaults = LockOptions::default();
        LockOptions {
            timeout: timeout_from_secs(self.timeout_secs),
            poll_interval: Duration::try_from_secs_f64(self.poll_interval_secs)
                .unwrap_or(defaults.poll_interval),
            stale_timeout: Duration::try_from_secs_f64(self.stale_timeout_secs)
                .unwrap_or(defaults.stale_timeout),
        }
    }
}
