use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const INVALID_REQUEST_BODY: &str = "Invalid request body";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern should compile")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn invalid_body() -> Self {
        Self::new(INVALID_REQUEST_BODY)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ── requests ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animal_type: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A creation request that passed validation, with images decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub email: String,
    pub name: String,
    pub animal_type: String,
    pub images: Vec<Vec<u8>>,
}

impl CreateCollectionRequest {
    /// Image count is deliberately not bounded here; the upload form
    /// enforces the 8..=20 range before submitting.
    pub fn validate(self) -> Result<NewCollection, ValidationError> {
        let (Some(email), Some(name), Some(animal_type)) = (
            non_blank(self.email),
            non_blank(self.name),
            non_blank(self.animal_type),
        ) else {
            return Err(ValidationError::new("Missing required fields"));
        };
        if self.images.is_empty() {
            return Err(ValidationError::new("Missing required fields"));
        }
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(ValidationError::new("Invalid email format"));
        }

        let images = self
            .images
            .iter()
            .enumerate()
            .map(|(index, encoded)| {
                decode_image(encoded).ok_or_else(|| {
                    ValidationError::new(format!("Image {} is not valid base64", index + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewCollection {
            email,
            name,
            animal_type,
            images,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub collection_status: Option<Value>,
    #[serde(default)]
    pub runpod_secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub credentials: CollectionCredentials,
    /// Raw requested status code; mapping to a lifecycle state happens once
    /// the collection is loaded.
    pub target: i64,
}

impl StatusUpdateRequest {
    pub fn validate(&self) -> Result<StatusUpdate, ValidationError> {
        let credentials =
            CollectionCredentials::from_parts(self.collection_id.clone(), self.secret_key.clone())?;
        let target = self
            .collection_status
            .as_ref()
            .and_then(flexible_integer)
            .ok_or_else(ValidationError::invalid_body)?;
        Ok(StatusUpdate {
            credentials,
            target,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub payment_key: Option<String>,
    /// The payment redirect hands the amount over as a query string, so both
    /// `3900` and `"3900"` are accepted.
    #[serde(default)]
    pub price: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub collection_id: String,
    pub payment_key: String,
    pub price: i64,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<PaymentConfirmation, ValidationError> {
        let (Some(collection_id), Some(payment_key), Some(price)) = (
            non_blank(self.collection_id.clone()),
            non_blank(self.payment_key.clone()),
            self.price.as_ref().and_then(flexible_integer),
        ) else {
            return Err(ValidationError::invalid_body());
        };
        Ok(PaymentConfirmation {
            collection_id,
            payment_key,
            price,
        })
    }
}

/// Body of `/execPod` and `/cancelPayment`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIdRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
}

impl CollectionIdRequest {
    pub fn validate(&self) -> Result<String, ValidationError> {
        non_blank(self.collection_id.clone()).ok_or_else(ValidationError::invalid_body)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDatetimeRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub runpod_secret_key: Option<String>,
}

impl StartDatetimeRequest {
    pub fn credentials(&self) -> Result<CollectionCredentials, ValidationError> {
        CollectionCredentials::from_parts(self.collection_id.clone(), self.secret_key.clone())
    }
}

/// Identifier plus capability token, as used by `/getImages` and
/// `/checkStartDatetime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCredentials {
    pub collection_id: String,
    pub secret_key: String,
}

impl CollectionCredentials {
    pub fn from_parts(
        collection_id: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, ValidationError> {
        match (non_blank(collection_id), non_blank(secret_key)) {
            (Some(collection_id), Some(secret_key)) => Ok(Self {
                collection_id,
                secret_key,
            }),
            _ => Err(ValidationError::invalid_body()),
        }
    }
}

// ── responses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionResponse {
    pub collection_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultImagesResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIdResponse {
    pub collection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub receipt: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmissionResponse {
    pub out_json: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDatetimeResponse {
    pub start_datetime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPaymentResponse {
    pub result: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Accepts integral JSON numbers and numeric strings.
pub fn flexible_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Decodes a base64 image, with or without a `data:<mime>;base64,` prefix.
pub fn decode_image(encoded: &str) -> Option<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((header, payload)) if header.starts_with("data:") => payload,
        _ => encoded,
    };
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    (!bytes.is_empty()).then_some(bytes)
}
