//! Service layer for the target registry.
//! - `targets::TargetService` is the CRUD entry point: validation, id/time derivation.
//! - `storage` holds the backend contract, the provider registry and the backends.
//! - Errors share one `errors::ServiceError` type across every backend.

pub mod errors;
pub mod storage;
pub mod targets;

pub use errors::{ErrorKind, ServiceError};
pub use storage::{ProviderRegistry, Storage, StorageProvider};
pub use targets::TargetService;
