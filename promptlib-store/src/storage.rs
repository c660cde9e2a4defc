//! Key/value document storage backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::StoreResult;

/// Trait implemented by persistent document backends.
///
/// Each store keeps one JSON document under a fixed key and rewrites it
/// wholesale after every mutation.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Loads the document stored under `key`, if any.
    async fn load(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces the document stored under `key`.
    async fn save(&self, key: &str, document: &str) -> StoreResult<()>;

    /// Removes the document stored under `key`.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// File-backed storage writing `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStateStorage {
    dir: PathBuf,
}

impl FileStateStorage {
    /// Opens (or creates) the storage directory.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while creating the directory.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StateStorage for FileStateStorage {
    async fn load(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, key: &str, document: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(document.as_bytes()).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// In-process storage used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStorage {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStateStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns `true` when no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl StateStorage for MemoryStateStorage {
    async fn load(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, document: &str) -> StoreResult<()> {
        self.documents
            .write()
            .await
            .insert(key.to_owned(), document.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStateStorage::open(dir.path().join("state")).await.unwrap();

        assert!(storage.load("roles").await.unwrap().is_none());
        storage.save("roles", r#"{"roles":[]}"#).await.unwrap();
        assert_eq!(
            storage.load("roles").await.unwrap().as_deref(),
            Some(r#"{"roles":[]}"#)
        );
        assert!(dir.path().join("state/roles.json").exists());

        storage.remove("roles").await.unwrap();
        storage.remove("roles").await.unwrap();
        assert!(storage.load("roles").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_storage_overwrites() {
        let storage = MemoryStateStorage::new();
        storage.save("k", "one").await.unwrap();
        storage.save("k", "two").await.unwrap();
        assert_eq!(storage.load("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(storage.len().await, 1);
    }
}
