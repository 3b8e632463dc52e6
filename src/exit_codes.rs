//! Exit code constants for the oncefs CLI.
//!
//! - 0: Success (operation ran, or had already completed)
//! - 1: User error (bad args, invalid config, filesystem failure)
//! - 2: The guarded operation failed on this run
//! - 3: A previous run of the operation failed and the failure is recorded
//! - 4: Lock acquisition timed out

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or filesystem failure.
pub const USER_ERROR: i32 = 1;

/// The guarded operation ran here and failed.
pub const OPERATION_FAILURE: i32 = 2;

/// A failure marker from an earlier run already exists.
pub const PRIOR_FAILURE: i32 = 3;

/// Lock acquisition failure: the deadline passed while another holder kept the lock.
pub const LOCK_TIMEOUT: i32 = 4;
