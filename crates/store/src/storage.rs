//! Metadata file storage backends (in-memory and local filesystem).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Result, StoreError};

/// Flat keyed storage for metadata files.
///
/// `put` is first-writer-wins: it must fail, not overwrite, when the
/// filename already holds content. That single property is what turns
/// concurrent publishes of the same version into a detected conflict
/// instead of silent corruption. `replace` exists solely for the
/// unversioned `timestamp.json`, which is rewritten every publish cycle.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write bytes under a filename that must not yet exist.
    async fn put(&self, filename: &str, bytes: Bytes) -> Result<()>;

    /// Write bytes under a filename, replacing any existing content.
    async fn replace(&self, filename: &str, bytes: Bytes) -> Result<()>;

    /// Read the bytes stored under a filename.
    async fn get(&self, filename: &str) -> Result<Bytes>;

    /// Whether the filename holds content.
    async fn exists(&self, filename: &str) -> Result<bool>;
}

/// In-memory store for tests and ephemeral repositories.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn put(&self, filename: &str, bytes: Bytes) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.contains_key(filename) {
            return Err(StoreError::FilenameExists(filename.to_string()));
        }
        inner.insert(filename.to_string(), bytes);
        Ok(())
    }

    async fn replace(&self, filename: &str, bytes: Bytes) -> Result<()> {
        self.inner.write().insert(filename.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, filename: &str) -> Result<Bytes> {
        self.inner
            .read()
            .get(filename)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(filename.to_string()))
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        Ok(self.inner.read().contains_key(filename))
    }
}

/// Local filesystem store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(FsStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}

#[async_trait]
impl MetadataStore for FsStore {
    async fn put(&self, filename: &str, bytes: Bytes) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        // create_new makes the existence check and the create one atomic
        // operation at the filesystem level
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(filename))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::FilenameExists(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn replace(&self, filename: &str, bytes: Bytes) -> Result<()> {
        // write-then-rename so readers never observe a half-written file
        let tmp = self.path_for(&format!("{filename}.tmp"));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.path_for(filename)).await?;
        Ok(())
    }

    async fn get(&self, filename: &str) -> Result<Bytes> {
        match tokio::fs::read(self.path_for(filename)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(filename)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_is_first_writer_wins() {
        let store = MemoryStore::new();
        store.put("1.root.json", Bytes::from_static(b"first")).await.unwrap();
        let err = store
            .put("1.root.json", Bytes::from_static(b"second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FilenameExists(_)));
        assert_eq!(store.get("1.root.json").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_memory_replace_overwrites() {
        let store = MemoryStore::new();
        store.replace("timestamp.json", Bytes::from_static(b"one")).await.unwrap();
        store.replace("timestamp.json", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("timestamp.json").await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_memory_get_missing() {
        let store = MemoryStore::new();
        let err = store.get("absent.json").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!store.exists("absent.json").await.unwrap());
    }
}
