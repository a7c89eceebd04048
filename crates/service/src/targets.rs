use std::sync::Arc;

use chrono::Utc;
use models::Target;
use tracing::{debug, error, instrument};

use crate::errors::ServiceError;
use crate::storage::{ProviderRegistry, Storage};

/// Target CRUD independent of the storage backend.
///
/// Validation happens here, before any backend call. Backend errors are
/// logged and handed back unchanged so callers can map each kind.
#[derive(Clone)]
pub struct TargetService {
    storage: Arc<dyn Storage>,
}

impl TargetService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolve `kind` in the registry and wrap the resulting backend.
    pub async fn from_registry(registry: &ProviderRegistry, kind: &str, config: &str) -> Result<Self, ServiceError> {
        Ok(Self::new(registry.resolve(kind, config).await?))
    }

    /// Validate, derive the id from the name, stamp the time and store.
    ///
    /// # Examples
    /// ```
    /// use models::{Entry, Target};
    /// use service::storage::MemoryStorage;
    /// use service::targets::TargetService;
    /// use std::sync::Arc;
    /// let svc = TargetService::new(Arc::new(MemoryStorage::new()));
    /// let mut t = Target::new("web1").entry(Entry::new(["10.0.0.1:9100"], [("job", "node")]));
    /// tokio_test::block_on(svc.create(&mut t)).unwrap();
    /// assert_eq!(t.id.as_str(), "web1");
    /// ```
    #[instrument(skip(self, target), fields(name = %target.name))]
    pub async fn create(&self, target: &mut Target) -> Result<(), ServiceError> {
        target.validate()?;
        target.id = target.name.as_str().into();
        target.time = Utc::now();
        let res = self.storage.create(target).await;
        log_failure("create", &res);
        res
    }

    /// Replace the target addressed by `target.id` with the given fields.
    #[instrument(skip(self, target), fields(id = %target.id))]
    pub async fn update(&self, target: &mut Target) -> Result<(), ServiceError> {
        if target.id.is_empty() {
            return Err(ServiceError::Validation("id is required".into()));
        }
        target.validate()?;
        target.time = Utc::now();
        let res = self.storage.update(target).await;
        log_failure("update", &res);
        res
    }

    #[instrument(skip(self, target), fields(id = %target.id))]
    pub async fn delete(&self, target: &Target) -> Result<(), ServiceError> {
        if target.id.is_empty() {
            return Err(ServiceError::Validation("id is required".into()));
        }
        let res = self.storage.delete(&target.id).await;
        log_failure("delete", &res);
        res
    }

    /// Load the target addressed by `target.id` into `target`.
    #[instrument(skip(self, target), fields(id = %target.id))]
    pub async fn get(&self, target: &mut Target) -> Result<(), ServiceError> {
        if target.id.is_empty() {
            return Err(ServiceError::Validation("id is required".into()));
        }
        self.storage.get(target).await
    }

    pub async fn list(&self) -> Result<Vec<Target>, ServiceError> {
        let targets = self.storage.get_all().await?;
        debug!(count = targets.len(), "targets listed");
        Ok(targets)
    }

    pub async fn is_healthy(&self) -> bool {
        self.storage.is_healthy().await
    }
}

fn log_failure(op: &str, res: &Result<(), ServiceError>) {
    if let Err(e) = res {
        error!(op, code = e.code(), error = %e, "storage operation failed");
    }
}
