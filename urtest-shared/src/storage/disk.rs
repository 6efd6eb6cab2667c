//! Local directory backend for [`FileStore`]

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FileStore, StorageError, StorageKey};

/// Flat directory of attachment files
///
/// Writes go to a uniquely named temporary file in the same directory (same
/// filesystem), are flushed to disk and then hard-linked to the final name.
/// Linking fails if the name exists, which makes the check and the publish a
/// single step.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Opens the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "File store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a key
    pub fn path_for(&self, key: &StorageKey) -> Result<PathBuf, StorageError> {
        let name = key.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(format!(".upload-{}.tmp", Uuid::new_v4()))
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl FileStore for DiskStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<u64, StorageError> {
        let target = self.path_for(key)?;
        let tmp = self.temp_path();

        if let Err(e) = write_synced(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        let linked = tokio::fs::hard_link(&tmp, &target).await;
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), error = %e, "Failed to remove temporary upload");
        }

        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(key = %key, "Refusing to overwrite stored file");
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(key = %key, bytes = data.len(), "Stored file");
        Ok(data.len() as u64)
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "File already missing from store");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
