use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed collection price in the smallest currency unit.
pub const BASE_PRICE: i64 = 3900;
pub const SECRET_KEY_LENGTH: usize = 6;

const SECRET_KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lifecycle state of a collection.
///
/// Stored and exposed as the decimal codes `"0"` through `"4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CollectionStatus {
    Created,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl CollectionStatus {
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Processing,
        Self::Completed,
        Self::Error,
        Self::Cancelled,
    ];

    pub const fn as_code(self) -> &'static str {
        match self {
            Self::Created => "0",
            Self::Processing => "1",
            Self::Completed => "2",
            Self::Error => "3",
            Self::Cancelled => "4",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_code() == code.trim())
    }

    /// Legal lifecycle moves. `Processing -> Processing` is the job's start
    /// acknowledgement after the trigger already claimed the collection.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Processing)
                | (Self::Created, Self::Error)
                | (Self::Processing, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
                | (Self::Error, Self::Cancelled)
        )
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl From<CollectionStatus> for String {
    fn from(status: CollectionStatus) -> Self {
        status.as_code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown collection status code '{0}'")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for CollectionStatus {
    type Error = UnknownStatus;

    fn try_from(code: String) -> Result<Self, UnknownStatus> {
        Self::from_code(&code).ok_or(UnknownStatus(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Collection cannot move from status {from} to status {to}")]
pub struct TransitionError {
    pub from: CollectionStatus,
    pub to: CollectionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Already paid")]
pub struct AlreadyPaid;

/// The persisted collection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub collection_id: String,
    pub email: String,
    pub name: String,
    pub animal_type: String,
    pub secret_key: String,
    pub collection_status: CollectionStatus,
    pub create_datetime: String,
    pub start_datetime: String,
    pub end_datetime: String,
    pub paid: bool,
    pub price: i64,
    pub payment_key: String,
    pub receipt: String,
    /// Bumped by the record store on every successful write.
    pub version: u64,
}

impl Collection {
    pub fn new(
        collection_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        animal_type: impl Into<String>,
        secret_key: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            email: email.into(),
            name: name.into(),
            animal_type: animal_type.into(),
            secret_key: secret_key.into(),
            collection_status: CollectionStatus::Created,
            create_datetime: timestamp(created_at),
            start_datetime: String::new(),
            end_datetime: String::new(),
            paid: false,
            price: BASE_PRICE,
            payment_key: String::new(),
            receipt: String::new(),
            version: 0,
        }
    }

    pub fn secret_matches(&self, candidate: &str) -> bool {
        !self.secret_key.is_empty() && self.secret_key == candidate
    }

    pub fn transition(&mut self, next: CollectionStatus) -> Result<(), TransitionError> {
        if !self.collection_status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.collection_status,
                to: next,
            });
        }
        self.collection_status = next;
        Ok(())
    }

    pub fn record_payment(
        &mut self,
        payment_key: impl Into<String>,
        price: i64,
        receipt: impl Into<String>,
    ) -> Result<(), AlreadyPaid> {
        if self.paid {
            return Err(AlreadyPaid);
        }
        self.paid = true;
        self.payment_key = payment_key.into();
        self.price = price;
        self.receipt = receipt.into();
        Ok(())
    }

    pub fn view(&self) -> CollectionView {
        CollectionView {
            collection_status: self.collection_status,
            create_datetime: self.create_datetime.clone(),
            email: self.email.clone(),
            end_datetime: self.end_datetime.clone(),
            animal_type: self.animal_type.clone(),
            name: self.name.clone(),
            paid: self.paid,
            price: self.price,
            receipt: self.receipt.clone(),
            start_datetime: self.start_datetime.clone(),
        }
    }
}

/// Public read projection served by `GET /collections`. Capability tokens
/// and gateway keys are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub collection_status: CollectionStatus,
    pub create_datetime: String,
    pub email: String,
    pub end_datetime: String,
    pub animal_type: String,
    pub name: String,
    pub paid: bool,
    pub price: i64,
    pub receipt: String,
    pub start_datetime: String,
}

pub fn generate_collection_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn generate_secret_key(rng: &mut impl Rng) -> String {
    (0..SECRET_KEY_LENGTH)
        .map(|_| {
            let index = rng.gen_range(0..SECRET_KEY_ALPHABET.len());
            char::from(SECRET_KEY_ALPHABET[index])
        })
        .collect()
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
