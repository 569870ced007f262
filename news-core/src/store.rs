use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;

/// Raw record persisted for one partition: the dataset payload plus the
/// time it was last fetched (epoch millis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub payload: serde_json::Value,
    pub fetched_at: i64,
}

/// Partition-scoped persistent store. One handle is opened at the
/// application root and injected wherever a cache is built; there is no
/// module-level singleton.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, partition: &str) -> Result<Option<StoredEntry>, StoreError>;
    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<(), StoreError>;
    async fn clear(&self, partition: &str) -> Result<(), StoreError>;
}

/// File-backed store: one pretty-printed `{partition}.json` per partition.
///
/// Writes go through a `.json.tmp` sibling followed by a rename; reads fall
/// back to the tmp file when the main file fails to parse, so a crash
/// mid-write never loses the previous good value.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Store rooted under the platform data directory (`<data>/icnews`).
    pub fn open_default() -> Option<Self> {
        dirs::data_dir().map(|base| Self::new(base.join("icnews")))
    }

    fn partition_path(&self, partition: &str) -> PathBuf {
        self.dir.join(format!("{partition}.json"))
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn get(&self, partition: &str) -> Result<Option<StoredEntry>, StoreError> {
        let path = self.partition_path(partition);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice::<StoredEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to parse partition, trying tmp fallback");
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => Ok(serde_json::from_slice::<StoredEntry>(&tmp_bytes).ok()),
                    Err(_) => Ok(None),
                }
            }
        }
    }

    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<(), StoreError> {
        let path = self.partition_path(partition);
        let bytes = serde_json::to_vec_pretty(&entry)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, partition: &str) -> Result<(), StoreError> {
        let path = self.partition_path(partition);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store used by tests and as a degraded mode when no data
/// directory is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, partition: &str) -> Result<Option<StoredEntry>, StoreError> {
        Ok(self.inner.read().await.get(partition).cloned())
    }

    async fn put(&self, partition: &str, entry: StoredEntry) -> Result<(), StoreError> {
        self.inner.write().await.insert(partition.to_owned(), entry);
        Ok(())
    }

    async fn clear(&self, partition: &str) -> Result<(), StoreError> {
        self.inner.write().await.remove(partition);
        Ok(())
    }
}
