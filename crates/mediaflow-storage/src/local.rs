use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};
use crate::fs::{move_file, remove_dir_if_exists};

/// Upload root where finished media and its artifacts are published.
///
/// Keys are relative paths such as `{prefix}/{filename}` and are what media
/// records store.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    base_path: PathBuf,
}

impl LocalMediaStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a path under the upload root, rejecting keys
    /// that could escape it.
    pub fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains(['\\', '\0'])
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key '{}' contains invalid characters",
                storage_key
            )));
        }
        Ok(self.base_path.join(storage_key))
    }

    /// Write bytes to `key`, replacing any existing file.
    pub async fn write(&self, storage_key: &str, data: &[u8]) -> StorageResult<PathBuf> {
        let path = self.key_to_path(storage_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media written to upload directory"
        );
        Ok(path)
    }

    /// Move `source` into the upload root at `key`.
    pub async fn publish(&self, source: &Path, storage_key: &str) -> StorageResult<PathBuf> {
        let path = self.key_to_path(storage_key)?;
        let start = Instant::now();

        move_file(source, &path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to publish {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media published"
        );
        Ok(path)
    }

    pub async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Remove a published directory (e.g. `{prefix}`) and everything in it.
    pub async fn remove_dir(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        remove_dir_if_exists(&path).await?;
        Ok(())
    }
}
