//! Configuration model for oncefs.
//!
//! `Config` represents an optional `oncefs.yaml` in the shared base
//! directory (or a file named on the command line). It supports
//! forward-compatible YAML parsing (unknown fields are ignored), defaults for
//! every field, and validation of the timing values.

mod model;
mod operations;


// Re-export public API
pub use model::{CONFIG_FILE_NAME, Config};
