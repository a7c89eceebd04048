use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{FileStorageProvider, MemoryStorageProvider, Storage, StorageProvider};
use crate::errors::ServiceError;

/// Maps a storage kind (e.g. `"filedb"`) to the provider that opens it.
///
/// Built once at startup and handed to whoever needs to resolve a backend;
/// there is no process-wide instance.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn StorageProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FileStorageProvider));
        registry.register(Arc::new(MemoryStorageProvider));
        #[cfg(feature = "dynamodb")]
        registry.register(Arc::new(super::dynamo::DynamoStorageProvider));
        #[cfg(feature = "mongodb")]
        registry.register(Arc::new(super::mongo::MongoStorageProvider));
        registry
    }

    /// Record a provider under its service id. A later registration for the
    /// same id replaces the earlier one.
    pub fn register(&mut self, provider: Arc<dyn StorageProvider>) {
        let kind = provider.service_id().to_string();
        debug!(%kind, "storage provider registered");
        self.providers.insert(kind, provider);
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Open the backend registered under `kind` with its config string.
    pub async fn resolve(&self, kind: &str, config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
        let provider = self
            .providers
            .get(kind)
            .ok_or_else(|| ServiceError::other(format!("storage {kind} is not implemented")))?;
        let storage = provider.open(config).await.map_err(|e| ServiceError::Other {
            text: format!("couldn't initialize {kind} storage"),
            source: Some(Box::new(e)),
        })?;
        info!(%kind, "storage resolved");
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::error::Error as _;

    struct FixedProvider {
        id: &'static str,
        storage: Arc<MemoryStorage>,
    }

    #[async_trait]
    impl StorageProvider for FixedProvider {
        fn service_id(&self) -> &'static str {
            self.id
        }

        async fn open(&self, _config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
            let storage: Arc<dyn Storage> = self.storage.clone();
            Ok(storage)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl StorageProvider for FailingProvider {
        fn service_id(&self) -> &'static str {
            "broken"
        }

        async fn open(&self, config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
            Err(ServiceError::storage("couldn't connect", format!("bad config {config}")))
        }
    }

    #[tokio::test]
    async fn unknown_kind_is_not_implemented() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("nope", "").await.err().expect("miss");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.to_string().contains("not implemented"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let first = Arc::new(MemoryStorage::new());
        let second = Arc::new(MemoryStorage::new());
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider { id: "testdb", storage: first.clone() }));
        registry.register(Arc::new(FixedProvider { id: "testdb", storage: second.clone() }));
        assert_eq!(registry.kinds(), vec!["testdb"]);

        let resolved = registry.resolve("testdb", "").await.expect("resolve");
        let resolved_ptr = Arc::as_ptr(&resolved) as *const u8;
        assert_eq!(resolved_ptr, Arc::as_ptr(&second) as *const u8);
        assert_ne!(resolved_ptr, Arc::as_ptr(&first) as *const u8);
    }

    #[tokio::test]
    async fn factory_error_is_wrapped_with_cause() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider));
        let err = registry.resolve("broken", "x").await.err().expect("factory failure");
        assert_eq!(err.kind(), ErrorKind::Other);
        let cause = err.source().expect("wrapped cause");
        assert_eq!(cause.to_string(), "storage error: couldn't connect");
        assert_eq!(cause.source().map(|e| e.to_string()), Some("bad config x".to_string()));
    }

    #[test]
    fn builtin_registry_knows_file_and_memory() {
        let registry = ProviderRegistry::with_builtin();
        let kinds = registry.kinds();
        assert!(kinds.contains(&"filedb"));
        assert!(kinds.contains(&"memory"));
    }
}
