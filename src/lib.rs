//! oncefs: run an expensive step exactly once across processes and hosts
//! that share only a filesystem.
//!
//! Two layers:
//! - [`locks`]: a cross-host advisory lock built on atomic `mkdir`, with
//!   holder records and recovery from abandoned locks.
//! - [`once`]: a call-once guard on top of the lock that records success or
//!   failure in durable marker files, so later callers skip the work or see
//!   the recorded failure.
//!
//! The `oncefs` binary wraps the guard around an external command.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod once;

pub use error::{OnceError, Result};
pub use once::{CallOnce, Outcome};
