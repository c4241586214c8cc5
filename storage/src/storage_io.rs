use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

/// Asynchronous byte store addressed by path.
///
/// Paths are plain strings so that cloud implementations can accept blob URLs as well as local
/// file paths.
#[async_trait]
pub trait StorageIO: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;
    async fn path_exists(&self, path: &str) -> Result<bool, StorageError>;
    async fn create_directory_if_not_exists(&self, path: &str) -> Result<(), StorageError>;

    /// Creates the parent directory of `path`, if it has one.
    async fn create_parent_directory(&self, path: &str) -> Result<(), StorageError> {
        match Path::new(path).parent().and_then(Path::to_str) {
            Some(parent) if !parent.is_empty() => self.create_directory_if_not_exists(parent).await,
            _ => Ok(()),
        }
    }
}
