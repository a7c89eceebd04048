use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use models::{Target, TargetId};
use tokio::fs;
use tracing::debug;

use super::json_map_file::{sidecar, JsonMapFile};
use super::lock::FileLock;
use super::{Storage, StorageProvider};
use crate::errors::ServiceError;

pub const STORAGE_ID: &str = "filedb";

/// Targets kept in one JSON file as an `id -> target` object.
///
/// Mutations run under [`FileLock`] (process mutex plus `<path>.lock`) and
/// rewrite the whole file. Reads take no lock.
#[derive(Debug)]
pub struct FileStorage {
    store: JsonMapFile<String, Target>,
    lock: FileLock,
}

impl FileStorage {
    /// Storage over an existing file. Use [`FileStorageProvider`] to create it.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let lock = FileLock::new(sidecar(&path, "lock"));
        Self { store: JsonMapFile::new(path), lock }
    }

    #[cfg(test)]
    pub(crate) fn with_lock_policy<P: Into<PathBuf>>(path: P, policy: super::lock::RetryPolicy) -> Self {
        let path = path.into();
        let lock = FileLock::with_policy(sidecar(&path, "lock"), policy);
        Self { store: JsonMapFile::new(path), lock }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Lock, load, apply `f`, write back. The lock is released on every path.
    async fn update_map<F>(&self, f: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut HashMap<String, Target>) -> Result<(), ServiceError> + Send,
    {
        let _guard = self
            .lock
            .acquire()
            .await
            .map_err(|e| ServiceError::storage("couldn't lock file", e))?;
        let mut targets = self.store.read().await?;
        f(&mut targets)?;
        self.store.write(&targets).await
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn create(&self, target: &Target) -> Result<(), ServiceError> {
        self.update_map(|targets| {
            let key = target.id.as_str();
            if targets.contains_key(key) {
                return Err(ServiceError::conflict(key));
            }
            targets.insert(key.to_string(), target.clone());
            Ok(())
        })
        .await
    }

    async fn update(&self, target: &Target) -> Result<(), ServiceError> {
        self.update_map(|targets| {
            let stored = targets
                .get_mut(target.id.as_str())
                .ok_or_else(|| ServiceError::not_found(&target.id))?;
            *stored = target.clone();
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &TargetId) -> Result<(), ServiceError> {
        self.update_map(|targets| {
            targets
                .remove(id.as_str())
                .map(|_| ())
                .ok_or_else(|| ServiceError::not_found(id))
        })
        .await
    }

    async fn get(&self, target: &mut Target) -> Result<(), ServiceError> {
        let mut targets = self.store.read().await?;
        let stored = targets
            .remove(target.id.as_str())
            .ok_or_else(|| ServiceError::not_found(&target.id))?;
        target.name = stored.name;
        target.time = stored.time;
        target.entries = stored.entries;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Target>, ServiceError> {
        let targets = self.store.read().await?;
        Ok(targets.into_values().collect())
    }

    async fn is_healthy(&self) -> bool {
        match fs::metadata(self.path()).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }
}

/// Opens [`FileStorage`]; the config string is the data file path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStorageProvider;

#[async_trait]
impl StorageProvider for FileStorageProvider {
    fn service_id(&self) -> &'static str {
        STORAGE_ID
    }

    async fn open(&self, config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
        if config.trim().is_empty() {
            return Err(ServiceError::other("file storage needs a file path"));
        }
        let storage = FileStorage::new(config);
        storage.store.ensure_exists().await?;
        debug!(path = %storage.path().display(), "file storage opened");
        Ok(Arc::new(storage))
    }
}
