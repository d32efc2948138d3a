use pawto_core::collection::{AlreadyPaid, TransitionError};
use pawto_core::contract::ValidationError;
use thiserror::Error;

use crate::adapters::job_api::JobError;
use crate::adapters::mailer::MailError;
use crate::adapters::object_store::ObjectStoreError;
use crate::adapters::record_store::StoreError;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Objects(#[from] ObjectStoreError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Store(StoreError::Conflict(_)) => 409,
            Self::Store(_) | Self::Objects(_) | Self::Mail(_) | Self::Job(_) => 500,
        }
    }

    /// Message placed in the `{error, message}` response body.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) => message.clone(),
            Self::Store(StoreError::Conflict(_)) => {
                "Collection was modified concurrently".to_string()
            }
            Self::Store(_) | Self::Objects(_) | Self::Mail(_) | Self::Job(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<ValidationError> for HandlerError {
    fn from(error: ValidationError) -> Self {
        Self::BadRequest(error.message().to_string())
    }
}

impl From<TransitionError> for HandlerError {
    fn from(error: TransitionError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<AlreadyPaid> for HandlerError {
    fn from(error: AlreadyPaid) -> Self {
        Self::BadRequest(error.to_string())
    }
}
