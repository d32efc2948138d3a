use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use pawto_core::collection::{Collection, CollectionStatus};
use thiserror::Error;

use super::block_on;

const KEY_ATTRIBUTE: &str = "collectionId";
const VERSION_ATTRIBUTE: &str = "version";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection record is malformed: {0}")]
    Malformed(String),
    #[error("collection '{0}' already exists")]
    AlreadyExists(String),
    #[error("collection '{0}' was modified concurrently")]
    Conflict(String),
    #[error("record store request failed: {0}")]
    Backend(String),
}

/// Collection persistence with optimistic concurrency.
pub trait CollectionStore {
    fn get(&self, collection_id: &str) -> Result<Option<Collection>, StoreError>;

    /// Inserts a fresh record; fails with `AlreadyExists` on a key collision.
    fn insert(&self, collection: &Collection) -> Result<(), StoreError>;

    /// Replaces the record only if the stored version still equals
    /// `collection.version`. Returns the record as written, with the bumped
    /// version, or `Conflict` when another writer got there first.
    fn update(&self, collection: &Collection) -> Result<Collection, StoreError>;
}

pub struct DynamoCollectionStore {
    table: String,
    dynamo_client: aws_sdk_dynamodb::Client,
}

impl DynamoCollectionStore {
    pub fn new(table: impl Into<String>, dynamo_client: aws_sdk_dynamodb::Client) -> Self {
        Self {
            table: table.into(),
            dynamo_client,
        }
    }
}

impl CollectionStore for DynamoCollectionStore {
    fn get(&self, collection_id: &str) -> Result<Option<Collection>, StoreError> {
        let request = self
            .dynamo_client
            .get_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(collection_id.to_string()))
            .consistent_read(true);

        let output =
            block_on(request.send()).map_err(|error| StoreError::Backend(error.to_string()))?;
        output.item().map(collection_from_item).transpose()
    }

    fn insert(&self, collection: &Collection) -> Result<(), StoreError> {
        let request = self
            .dynamo_client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(collection_to_item(collection)))
            .condition_expression("attribute_not_exists(collectionId)");

        match block_on(request.send()) {
            Ok(_) => Ok(()),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::AlreadyExists(collection.collection_id.clone()))
            }
            Err(error) => Err(StoreError::Backend(error.to_string())),
        }
    }

    fn update(&self, collection: &Collection) -> Result<Collection, StoreError> {
        let expected = collection.version;
        let mut written = collection.clone();
        written.version = expected + 1;

        let condition = if expected == 0 {
            "attribute_exists(collectionId) AND (attribute_not_exists(#version) OR #version = :expected)"
        } else {
            "#version = :expected"
        };
        let request = self
            .dynamo_client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(collection_to_item(&written)))
            .condition_expression(condition)
            .expression_attribute_names("#version", VERSION_ATTRIBUTE)
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()));

        match block_on(request.send()) {
            Ok(_) => Ok(written),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::Conflict(collection.collection_id.clone()))
            }
            Err(error) => Err(StoreError::Backend(error.to_string())),
        }
    }
}

pub fn collection_to_item(collection: &Collection) -> HashMap<String, AttributeValue> {
    let text = |value: &str| AttributeValue::S(value.to_string());
    HashMap::from([
        (KEY_ATTRIBUTE.to_string(), text(&collection.collection_id)),
        ("email".to_string(), text(&collection.email)),
        ("name".to_string(), text(&collection.name)),
        ("animalType".to_string(), text(&collection.animal_type)),
        ("secretKey".to_string(), text(&collection.secret_key)),
        (
            "collectionStatus".to_string(),
            text(collection.collection_status.as_code()),
        ),
        ("createDatetime".to_string(), text(&collection.create_datetime)),
        ("startDatetime".to_string(), text(&collection.start_datetime)),
        ("endDatetime".to_string(), text(&collection.end_datetime)),
        ("paid".to_string(), AttributeValue::Bool(collection.paid)),
        (
            "price".to_string(),
            AttributeValue::N(collection.price.to_string()),
        ),
        ("paymentKey".to_string(), text(&collection.payment_key)),
        ("receipt".to_string(), text(&collection.receipt)),
        (
            VERSION_ATTRIBUTE.to_string(),
            AttributeValue::N(collection.version.to_string()),
        ),
    ])
}

pub fn collection_from_item(
    item: &HashMap<String, AttributeValue>,
) -> Result<Collection, StoreError> {
    let collection_id = required_text(item, KEY_ATTRIBUTE)?;
    let status_code = required_text(item, "collectionStatus")?;
    let collection_status = CollectionStatus::from_code(&status_code).ok_or_else(|| {
        StoreError::Malformed(format!(
            "{collection_id}: unknown collectionStatus '{status_code}'"
        ))
    })?;

    Ok(Collection {
        email: required_text(item, "email")?,
        secret_key: required_text(item, "secretKey")?,
        name: optional_text(item, "name"),
        animal_type: optional_text(item, "animalType"),
        collection_status,
        create_datetime: optional_text(item, "createDatetime"),
        start_datetime: optional_text(item, "startDatetime"),
        end_datetime: optional_text(item, "endDatetime"),
        paid: item
            .get("paid")
            .and_then(|value| value.as_bool().ok())
            .copied()
            .unwrap_or(false),
        price: optional_number(item, "price")?.unwrap_or_default(),
        payment_key: optional_text(item, "paymentKey"),
        receipt: optional_text(item, "receipt"),
        version: optional_number(item, VERSION_ATTRIBUTE)?.unwrap_or_default(),
        collection_id,
    })
}

fn required_text(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, StoreError> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| StoreError::Malformed(format!("missing string attribute '{name}'")))
}

fn optional_text(item: &HashMap<String, AttributeValue>, name: &str) -> String {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .unwrap_or_default()
}

fn optional_number<T: std::str::FromStr>(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<Option<T>, StoreError> {
    // Older records stored some numbers as strings.
    let Some(raw) = item
        .get(name)
        .and_then(|value| value.as_n().or_else(|_| value.as_s()).ok())
    else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| StoreError::Malformed(format!("attribute '{name}' is not a number: {raw}")))
}
