//! DynamoDB storage backend using `aws-sdk-dynamodb`.
//!
//! Each target is one item `{ id: S, data: S(json) }` keyed by `id`. The
//! table is created on open if it does not exist yet.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use models::{Target, TargetId};
use tracing::info;

use super::{Storage, StorageProvider};
use crate::errors::ServiceError;

pub const STORAGE_ID: &str = "dynamodb";

type Item = HashMap<String, AttributeValue>;

pub struct DynamoStorage {
    client: Client,
    table: String,
}

impl DynamoStorage {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }

    async fn create_table(&self) -> Result<(), ServiceError> {
        let attr = AttributeDefinition::builder()
            .attribute_name("id")
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| ServiceError::storage("invalid table definition", e))?;
        let key = KeySchemaElement::builder()
            .attribute_name("id")
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| ServiceError::storage("invalid table definition", e))?;

        let res = self
            .client
            .create_table()
            .table_name(&self.table)
            .attribute_definitions(attr)
            .key_schema(key)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;
        match res {
            Ok(_) => {
                info!(table = %self.table, "dynamodb table created");
                Ok(())
            }
            Err(e) if matches!(e.as_service_error(), Some(CreateTableError::ResourceInUseException(_))) => Ok(()),
            Err(e) => Err(ServiceError::storage("couldn't create table", aws_sdk_dynamodb::Error::from(e))),
        }
    }

    async fn fetch(&self, id: &TargetId) -> Result<Option<Target>, ServiceError> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| ServiceError::storage("couldn't get item", aws_sdk_dynamodb::Error::from(e)))?;
        out.item().map(decode).transpose()
    }

    async fn put(&self, target: &Target) -> Result<(), ServiceError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(encode(target)?))
            .send()
            .await
            .map_err(|e| ServiceError::storage("couldn't put item", aws_sdk_dynamodb::Error::from(e)))?;
        Ok(())
    }
}

fn encode(target: &Target) -> Result<Item, ServiceError> {
    let data = serde_json::to_string(target).map_err(|e| ServiceError::storage("couldn't encode item", e))?;
    Ok(HashMap::from([
        ("id".to_string(), AttributeValue::S(target.id.to_string())),
        ("data".to_string(), AttributeValue::S(data)),
    ]))
}

fn decode(item: &Item) -> Result<Target, ServiceError> {
    let data = item
        .get("data")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| ServiceError::Storage { text: "item has no data attribute".into(), source: None })?;
    serde_json::from_str(data).map_err(|e| ServiceError::storage("couldn't decode item", e))
}

#[async_trait]
impl Storage for DynamoStorage {
    async fn create(&self, target: &Target) -> Result<(), ServiceError> {
        // no native reject-on-exists for a plain put
        if self.fetch(&target.id).await?.is_some() {
            return Err(ServiceError::conflict(&target.id));
        }
        self.put(target).await
    }

    async fn update(&self, target: &Target) -> Result<(), ServiceError> {
        if self.fetch(&target.id).await?.is_none() {
            return Err(ServiceError::not_found(&target.id));
        }
        self.put(target).await
    }

    async fn delete(&self, id: &TargetId) -> Result<(), ServiceError> {
        if self.fetch(id).await?.is_none() {
            return Err(ServiceError::not_found(id));
        }
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| ServiceError::storage("couldn't delete item", aws_sdk_dynamodb::Error::from(e)))?;
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
        let mut targets = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let out = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| ServiceError::storage("couldn't scan table", aws_sdk_dynamodb::Error::from(e)))?;
            for item in out.items() {
                targets.push(decode(item)?);
            }
            match out.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(targets)
    }

    async fn is_healthy(&self) -> bool {
        self.client.describe_table().table_name(&self.table).send().await.is_ok()
    }
}

/// Opens [`DynamoStorage`]; the config string is the table name. Credentials
/// and region come from the standard AWS environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamoStorageProvider;

#[async_trait]
impl StorageProvider for DynamoStorageProvider {
    fn service_id(&self) -> &'static str {
        STORAGE_ID
    }

    async fn open(&self, config: &str) -> Result<Arc<dyn Storage>, ServiceError> {
        if config.trim().is_empty() {
            return Err(ServiceError::other("dynamodb storage needs a table name"));
        }
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let storage = DynamoStorage::new(Client::new(&sdk_config), config);
        storage.create_table().await?;
        Ok(Arc::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Entry;

    #[test]
    fn item_round_trips_through_data_attribute() {
        let mut t = Target::new("web1").entry(Entry::new(["10.0.0.1:9100"], [("job", "node")]));
        t.id = TargetId::from("web1");
        let item = encode(&t).expect("encode");
        assert_eq!(item.get("id").and_then(|v| v.as_s().ok()).map(String::as_str), Some("web1"));
        assert_eq!(decode(&item).expect("decode"), t);
    }

    #[test]
    fn item_without_data_is_a_storage_error() {
        let item = HashMap::from([("id".to_string(), AttributeValue::S("web1".into()))]);
        assert!(matches!(decode(&item), Err(ServiceError::Storage { .. })));
    }
}
