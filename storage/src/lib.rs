//! Storage crate: byte-level file access for results and serialized media.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`storage_io`] – StorageIO trait
//! - [`disk`] – DiskStorageIO (local file system)

mod disk;
mod error;
mod storage_io;

#[cfg(test)]
mod disk_test;

pub use disk::DiskStorageIO;
pub use error::StorageError;
pub use storage_io::StorageIO;
