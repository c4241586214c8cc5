//! Local file system implementation of [`StorageIO`].

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_io::StorageIO;

/// Reads and writes files on the local disk with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStorageIO;

impl DiskStorageIO {
    pub fn new() -> Self {
        Self
    }
}

fn check_path(path: &str) -> Result<(), StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::InvalidPath("empty path".to_string()));
    }
    Ok(())
}

#[async_trait]
impl StorageIO for DiskStorageIO {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        check_path(path)?;
        match tokio::fs::read(path).await {
            Ok(data) => {
                debug!(path = %path, bytes = data.len(), "Read file");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        check_path(path)?;
        self.create_parent_directory(path).await?;
        tokio::fs::write(path, data).await?;
        debug!(path = %path, bytes = data.len(), "Wrote file");
        Ok(())
    }

    async fn path_exists(&self, path: &str) -> Result<bool, StorageError> {
        check_path(path)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn create_directory_if_not_exists(&self, path: &str) -> Result<(), StorageError> {
        check_path(path)?;
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }
}
