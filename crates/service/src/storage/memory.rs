use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use models::{Target, TargetId};

use super::{Storage, StorageProvider};
use crate::errors::ServiceError;

pub const STORAGE_ID: &str = "memory";

/// Process-local storage with the same conflict/not-found contract as the
/// persistent backends. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    targets: Mutex<HashMap<String, Target>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn targets(&self) -> Result<MutexGuard<'_, HashMap<String, Target>>, ServiceError> {
        self.targets
            .lock()
            .map_err(|_| ServiceError::Storage { text: "memory storage lock poisoned".into(), source: None })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create(&self, target: &Target) -> Result<(), ServiceError> {
        let mut targets = self.targets()?;
        if targets.contains_key(target.id.as_str()) {
            return Err(ServiceError::conflict(&target.id));
        }
        targets.insert(target.id.to_string(), target.clone());
        Ok(())
    }

    async fn update(&self, target: &Target) -> Result<(), ServiceError> {
        let mut targets = self.targets()?;
        let stored = targets
            .get_mut(target.id.as_str())
            .ok_or_else(|| ServiceError::not_found(&target.id))?;
        *stored = target.clone();
        Ok(())
    }

    async fn delete(&self, id: &TargetId) -> Result<(), ServiceError> {
        self.targets()?
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found(id))
    }

    async fn get(&self, target: &mut Target) -> Result<(), ServiceError> {
        let targets = self.targets()?;
        let stored = targets
            .get(target.id.as_str())
            .ok_or_else(|| ServiceError::not_found(&target.id))?;
        target.name = stored.name.clone();
        target.time = stored.time;
        target.entries = stored.entries.clone();
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Target>, ServiceError> {
        Ok(self.targets()?.values().cloned().collect())
    }

    async fn is_healthy(&self) -> bool {
        !self.targets.is_poisoned()
    }
}

/// Opens a fresh, empty [`MemoryStorage`]; the config string is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStorageProvider;

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    fn service_id(&self) -> &'static str {
        STORAGE_ID
    }

    async fn open(&self, _config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
        Ok(Arc::new(MemoryStorage::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn stored(id: &str) -> Target {
        let mut t = Target::new(id);
        t.id = TargetId::from(id);
        t
    }

    #[tokio::test]
    async fn mirrors_persistent_contract() -> Result<(), anyhow::Error> {
        let storage = MemoryStorage::new();
        storage.create(&stored("a")).await?;
        assert_eq!(storage.create(&stored("a")).await.err().map(|e| e.kind()), Some(ErrorKind::Conflict));
        assert_eq!(storage.update(&stored("b")).await.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
        assert_eq!(
            storage.delete(&TargetId::from("b")).await.err().map(|e| e.kind()),
            Some(ErrorKind::NotFound)
        );

        let mut t = Target::with_id("a");
        storage.get(&mut t).await?;
        assert_eq!(t.name, "a");

        storage.delete(&TargetId::from("a")).await?;
        assert!(storage.get_all().await?.is_empty());
        assert!(storage.is_healthy().await);
        Ok(())
    }
}
