//! Filesystem utilities for oncefs.
//!
//! Everything here assumes the target directory may live on a network
//! filesystem whose client caches directory entries and attributes. Writes
//! are flushed explicitly, and existence checks force the client to
//! revalidate instead of trusting a cached `stat()`.

pub mod durable;
pub mod marker;

pub use durable::{sync_dir, write_and_sync};
pub use marker::{create_marker, nfs_file_exists, read_marker, remove_marker};
