//! Call-once execution across processes and hosts.
//!
//! # State Machine
//!
//! Each named operation is in one of four states, read entirely from the
//! filesystem under the operation's lock:
//! - *not started*: no markers
//! - *running*: a caller holds the lock and is executing
//! - *succeeded*: `<name>.done` exists
//! - *failed*: `<name>.failed` exists and holds the error text
//!
//! Only the lock holder writes markers, and at most one of the two exists at
//! a time. Markers are never overwritten; `clean` removes them to allow a
//! fresh run.

mod call_once;
mod paths;

#[cfg(test)]
mod tests;

// Re-export public API
pub use call_once::{CallOnce, OnceState, Outcome, clean, ensure_done};
pub use paths::{LOCKS_DIR_NAME, OncePaths};
