//! Error types for oncefs.
//!
//! Coordination failures (`LockTimeout`), recorded failures (`PriorFailure`)
//! and the guarded operation's own error (`Operation`) are separate variants
//! so callers can tell "we could not coordinate" apart from "the step failed".

use crate::exit_codes;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a guarded operation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for oncefs operations.
#[derive(Error, Debug)]
pub enum OnceError {
    /// The lock directory stayed held until the acquisition deadline passed.
    #[error("could not acquire lock '{}' within {:.1}s", path.display(), waited.as_secs_f64())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// A failure marker from an earlier execution exists.
    #[error("previous execution of '{name}' failed: {message}")]
    PriorFailure { name: String, message: String },

    /// The guarded operation returned an error on this run.
    ///
    /// Displays exactly as the operation's own error.
    #[error("{source}")]
    Operation {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A filesystem operation failed outside of best-effort cleanup.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The operation name cannot be used as a single path component.
    #[error("invalid operation name '{0}': must be a single, non-empty path component")]
    InvalidName(String),

    /// Configuration could not be read, parsed, or validated.
    #[error("config error: {0}")]
    Config(String),

    /// Bad command-line input (e.g. an unparseable command string).
    #[error("{0}")]
    UserError(String),
}

impl OnceError {
    /// Build an `Io` error with a human-readable context string.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        OnceError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            OnceError::LockTimeout { .. } => exit_codes::LOCK_TIMEOUT,
            OnceError::PriorFailure { .. } => exit_codes::PRIOR_FAILURE,
            OnceError::Operation { .. } => exit_codes::OPERATION_FAILURE,
            OnceError::Io { .. }
            | OnceError::InvalidName(_)
            | OnceError::Config(_)
            | OnceError::UserError(_) => {
                exit_codes::USER_ERROR
            }
        }
    }

    /// True when acquisition timed out; always safe to retry later.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OnceError::LockTimeout { .. })
    }

    /// True when the failure was recorded by an earlier execution.
    pub fn is_prior_failure(&self) -> bool {
        matches!(self, OnceError::PriorFailure { .. })
    }

    /// Recover the operation's original error, if this is an `Operation` error.
    pub fn into_operation_error(self) -> Option<BoxError> {
        match self {
            OnceError::Operation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for oncefs operations.
pub type Result<T> = std::result::Result<T, OnceError>;
