//! Unit tests for DiskStorageIO.

use tempfile::TempDir;

use crate::disk::DiskStorageIO;
use crate::error::StorageError;
use crate::storage_io::StorageIO;

#[tokio::test]
async fn test_write_creates_parent_and_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a/b/data.bin");
    let path = path.to_str().unwrap();
    let io = DiskStorageIO::new();

    io.write_file(path, b"bytes").await.unwrap();
    assert!(io.path_exists(path).await.unwrap());
    assert_eq!(io.read_file(path).await.unwrap(), b"bytes");
}

#[tokio::test]
async fn test_read_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.txt");
    let io = DiskStorageIO::new();

    let err = io.read_file(path.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(!io.path_exists(path.to_str().unwrap()).await.unwrap());
}

#[tokio::test]
async fn test_empty_path_rejected() {
    let io = DiskStorageIO::new();
    assert!(matches!(
        io.read_file("").await.unwrap_err(),
        StorageError::InvalidPath(_)
    ));
}

#[tokio::test]
async fn test_create_directory_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/dir");
    let path = path.to_str().unwrap();
    let io = DiskStorageIO::new();

    io.create_directory_if_not_exists(path).await.unwrap();
    io.create_directory_if_not_exists(path).await.unwrap();
    assert!(io.path_exists(path).await.unwrap());
}
