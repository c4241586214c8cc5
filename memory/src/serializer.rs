//! # Data Type Serializer
//!
//! Maps a [`PromptDataType`] to storage behaviour.
//!
//! | Kind | On disk | Sub-directory | Default extension |
//! |------|---------|---------------|-------------------|
//! | `text`, `url`, `error` | no | - | - |
//! | `image_path` | yes | `dbdata/images` | `png` |
//! | `audio_path` | yes | `dbdata/audio` | `mp3` |
//!
//! File names are `<results_root>/<sub-directory>/<microsecond timestamp>.<extension>`.
//! Values that are Azure blob URLs are read through the configured results [`StorageIO`];
//! everything else goes through [`DiskStorageIO`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use memory_core::{MemoryError, PromptDataType, Result};
use sha2::{Digest, Sha256};
use storage::{DiskStorageIO, StorageError, StorageIO};
use tracing::debug;

const BLOB_HOST_SUFFIX: &str = "blob.core.windows.net";

/// Results root plus the byte store that holds it.
#[derive(Clone)]
pub struct ResultsStorage {
    pub results_path: String,
    pub storage_io: Arc<dyn StorageIO>,
}

impl ResultsStorage {
    pub fn new(results_path: impl Into<String>, storage_io: Arc<dyn StorageIO>) -> Self {
        Self {
            results_path: results_path.into(),
            storage_io,
        }
    }

    /// Results on the local disk under `results_path`.
    pub fn disk(results_path: impl Into<String>) -> Self {
        Self::new(results_path, Arc::new(DiskStorageIO::new()))
    }

    pub fn results_path(&self) -> &Path {
        Path::new(&self.results_path)
    }
}

impl std::fmt::Debug for ResultsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultsStorage")
            .field("results_path", &self.results_path)
            .finish_non_exhaustive()
    }
}

pub(crate) fn map_storage_error(e: StorageError) -> MemoryError {
    match e {
        StorageError::NotFound(path) => MemoryError::not_found(format!("File not found: {}", path)),
        StorageError::Io(e) => MemoryError::Io(e),
        StorageError::InvalidPath(path) => MemoryError::validation(format!("Invalid path: {}", path)),
    }
}

/// True when `path` is an http(s) URL on an Azure blob storage host.
pub fn is_blob_storage_url(path: &str) -> bool {
    match url::Url::parse(path) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| h.ends_with(BLOB_HOST_SUFFIX))
        }
        Err(_) => false,
    }
}

/// Reads, writes and hashes the content behind one piece value.
#[derive(Debug, Clone)]
pub struct DataTypeSerializer {
    storage: ResultsStorage,
    data_type: PromptDataType,
    value: Option<String>,
    file_extension: Option<String>,
    file_path: Option<String>,
}

impl DataTypeSerializer {
    /// `text` and `url` need a value; `error` defaults to an empty one; disk kinds may start empty
    /// and get their value from `save_data`.
    pub fn new(
        storage: ResultsStorage,
        data_type: PromptDataType,
        value: Option<&str>,
        extension: Option<&str>,
    ) -> Result<Self> {
        let value = match (data_type, value) {
            (_, Some(v)) => Some(v.to_string()),
            (PromptDataType::Error, None) => Some(String::new()),
            (PromptDataType::ImagePath | PromptDataType::AudioPath, None) => None,
            (other, None) => {
                return Err(MemoryError::validation(format!(
                    "Data type {} without prompt text not supported",
                    other
                )))
            }
        };

        let file_extension = match data_type {
            PromptDataType::ImagePath => Some(extension.unwrap_or("png").to_string()),
            PromptDataType::AudioPath => Some(extension.unwrap_or("mp3").to_string()),
            _ => None,
        };

        Ok(Self {
            storage,
            data_type,
            value,
            file_extension,
            file_path: None,
        })
    }

    pub fn data_type(&self) -> PromptDataType {
        self.data_type
    }

    /// The inline content or the storage path. Empty until set for disk kinds.
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn data_on_disk(&self) -> bool {
        self.data_type.is_disk_resident()
    }

    fn data_sub_directory(&self) -> Option<&'static str> {
        match self.data_type {
            PromptDataType::ImagePath => Some("dbdata/images"),
            PromptDataType::AudioPath => Some("dbdata/audio"),
            _ => None,
        }
    }

    /// Path for new data. Generated on the first call and returned unchanged afterwards.
    pub async fn get_data_filename(&mut self) -> Result<String> {
        if let Some(path) = &self.file_path {
            return Ok(path.clone());
        }
        let (Some(sub_directory), Some(extension)) =
            (self.data_sub_directory(), self.file_extension.as_deref())
        else {
            return Err(MemoryError::validation("Data is not stored on disk"));
        };

        let ticks = Utc::now().timestamp_micros();
        let results_path = &self.storage.results_path;
        let path = if is_blob_storage_url(results_path) {
            format!(
                "{}/{}/{}.{}",
                results_path.trim_end_matches('/'),
                sub_directory,
                ticks,
                extension
            )
        } else {
            let directory: PathBuf = Path::new(results_path).join(sub_directory);
            let directory = directory.to_string_lossy().into_owned();
            self.storage
                .storage_io
                .create_directory_if_not_exists(&directory)
                .await
                .map_err(map_storage_error)?;
            Path::new(&directory)
                .join(format!("{}.{}", ticks, extension))
                .to_string_lossy()
                .into_owned()
        };

        self.file_path = Some(path.clone());
        Ok(path)
    }

    /// Writes `data` to a new file in results storage and points the value at it.
    pub async fn save_data(&mut self, data: &[u8]) -> Result<()> {
        let path = self.get_data_filename().await?;
        self.storage
            .storage_io
            .write_file(&path, data)
            .await
            .map_err(map_storage_error)?;
        debug!(path = %path, bytes = data.len(), "Saved serialized data");
        self.value = Some(path);
        Ok(())
    }

    /// Decodes base64 image data and saves it, to `output_filename` when given.
    pub async fn save_b64_image(&mut self, data: &str, output_filename: Option<&str>) -> Result<()> {
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| MemoryError::validation(format!("Invalid base64 image data: {}", e)))?;
        let path = match output_filename {
            Some(name) => name.to_string(),
            None => self.get_data_filename().await?,
        };
        self.storage
            .storage_io
            .write_file(&path, &bytes)
            .await
            .map_err(map_storage_error)?;
        self.value = Some(path);
        Ok(())
    }

    fn storage_io_for_value(&self) -> Arc<dyn StorageIO> {
        if is_blob_storage_url(self.value()) {
            self.storage.storage_io.clone()
        } else {
            Arc::new(DiskStorageIO::new())
        }
    }

    async fn read_stored_bytes(&self) -> Result<Vec<u8>> {
        let path = self.value();
        let storage_io = self.storage_io_for_value();
        let exists = storage_io.path_exists(path).await.map_err(map_storage_error)?;
        if !exists {
            return Err(MemoryError::not_found(format!("File not found: {}", path)));
        }
        storage_io.read_file(path).await.map_err(map_storage_error)
    }

    /// Bytes of the stored file. Inline kinds have no file and fail with a validation error.
    pub async fn read_data(&self) -> Result<Vec<u8>> {
        if !self.data_on_disk() {
            return Err(MemoryError::validation(format!(
                "Data for data type {} is not stored on disk",
                self.data_type
            )));
        }
        if self.value().is_empty() {
            return Err(MemoryError::validation("Prompt text not set"));
        }
        self.read_stored_bytes().await
    }

    pub async fn read_data_base64(&self) -> Result<String> {
        Ok(BASE64.encode(self.read_data().await?))
    }

    /// Hex SHA-256 of the file bytes (disk kinds) or of the UTF-8 value (inline kinds).
    pub async fn get_sha256(&self) -> Result<String> {
        let digest = if self.data_on_disk() {
            Sha256::digest(self.read_stored_bytes().await?)
        } else {
            Sha256::digest(self.value().as_bytes())
        };
        Ok(hex::encode(digest))
    }

    /// Extension of `file_path` without the dot.
    pub fn get_extension(file_path: &str) -> Option<String> {
        Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
    }

    pub fn get_mime_type(file_path: &str) -> Option<String> {
        mime_guess::from_path(file_path).first().map(|m| m.to_string())
    }
}
