//! MongoDB storage backend.
//!
//! Targets live in the `targets` collection of the database named by the
//! connection URI path and are matched on their `id` field.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use models::{Target, TargetId};
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use tracing::debug;

use super::{Storage, StorageProvider};
use crate::errors::ServiceError;

pub const STORAGE_ID: &str = "mongodb";
const COLLECTION: &str = "targets";

pub struct MongoStorage {
    db: Database,
    targets: Collection<Target>,
}

impl MongoStorage {
    pub fn new(db: Database) -> Self {
        let targets = db.collection::<Target>(COLLECTION);
        Self { db, targets }
    }

    async fn fetch(&self, id: &TargetId) -> Result<Option<Target>, ServiceError> {
        self.targets
            .find_one(by_id(id))
            .await
            .map_err(|e| ServiceError::storage("couldn't find document", e))
    }
}

fn by_id(id: &TargetId) -> Document {
    doc! { "id": id.as_str() }
}

#[async_trait]
impl Storage for MongoStorage {
    async fn create(&self, target: &Target) -> Result<(), ServiceError> {
        if self.fetch(&target.id).await?.is_some() {
            return Err(ServiceError::conflict(&target.id));
        }
        self.targets
            .insert_one(target)
            .await
            .map_err(|e| ServiceError::storage("couldn't insert document", e))?;
        Ok(())
    }

    async fn update(&self, target: &Target) -> Result<(), ServiceError> {
        let res = self
            .targets
            .replace_one(by_id(&target.id), target)
            .await
            .map_err(|e| ServiceError::storage("couldn't replace document", e))?;
        if res.matched_count == 0 {
            return Err(ServiceError::not_found(&target.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &TargetId) -> Result<(), ServiceError> {
        let res = self
            .targets
            .delete_one(by_id(id))
            .await
            .map_err(|e| ServiceError::storage("couldn't delete document", e))?;
        if res.deleted_count == 0 {
            return Err(ServiceError::not_found(id));
        }
        Ok(())
    }

    async fn get(&self, target: &mut Target) -> Result<(), ServiceError> {
        let stored = self.fetch(&target.id).await?.ok_or_else(|| ServiceError::not_found(&target.id))?;
        target.name = stored.name;
        target.time = stored.time;
        target.entries = stored.entries;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Target>, ServiceError> {
        let cursor = self
            .targets
            .find(doc! {})
            .await
            .map_err(|e| ServiceError::storage("couldn't find documents", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| ServiceError::storage("couldn't read documents", e))
    }

    async fn is_healthy(&self) -> bool {
        self.db.run_command(doc! { "ping": 1 }).await.is_ok()
    }
}

/// Opens [`MongoStorage`]; the config string is a connection URI such as
/// `mongodb://host:27017/promhsd`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoStorageProvider;

#[async_trait]
impl StorageProvider for MongoStorageProvider {
    fn service_id(&self) -> &'static str {
        STORAGE_ID
    }

    async fn open(&self, config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
        let client = Client::with_uri_str(config)
            .await
            .map_err(|e| ServiceError::storage("couldn't connect to mongodb", e))?;
        let db = client
            .default_database()
            .ok_or_else(|| ServiceError::other("mongodb uri must name a database"))?;
        debug!(database = %db.name(), "mongodb storage opened");
        Ok(Arc::new(MongoStorage::new(db)))
    }
}
