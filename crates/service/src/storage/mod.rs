//! Storage abstractions for the target service
//!
//! Every backend implements [`Storage`]; a [`StorageProvider`] opens one from
//! an opaque, backend-specific config string (file path, table name, URI) and
//! is looked up by kind through the [`ProviderRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use models::{Target, TargetId};

use crate::errors::ServiceError;

pub mod file;
pub mod json_map_file;
pub mod lock;
pub mod memory;
pub mod registry;

#[cfg(feature = "dynamodb")]
pub mod dynamo;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use file::{FileStorage, FileStorageProvider};
pub use memory::{MemoryStorage, MemoryStorageProvider};
pub use registry::ProviderRegistry;

/// Persistence contract shared by all backends.
///
/// Keys are always `target.id`. Callers are expected to have validated and
/// stamped the target already (see `TargetService`).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a new target; `Conflict` if its id is already stored.
    async fn create(&self, target: &Target) -> Result<(), ServiceError>;
    /// Replace a stored target wholesale; `NotFound` if absent.
    async fn update(&self, target: &Target) -> Result<(), ServiceError>;
    /// Remove a stored target; `NotFound` if absent.
    async fn delete(&self, id: &TargetId) -> Result<(), ServiceError>;
    /// Fill `target` in place from the record stored under `target.id`.
    async fn get(&self, target: &mut Target) -> Result<(), ServiceError>;
    /// Every stored target, in backend-defined order.
    async fn get_all(&self) -> Result<Vec<Target>, ServiceError>;
    async fn is_healthy(&self) -> bool;
}

/// Factory for one storage kind.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn service_id(&self) -> &'static str;
    async fn open(&self, config: &str) -> Result<Arc<dyn Storage>, ServiceError>;
}
