pub mod collections;
pub mod generation;
pub mod payment;
pub mod request;
pub mod response;
pub mod router;

use pawto_core::collection::Collection;
use pawto_core::contract::CollectionCredentials;

use crate::adapters::job_api::JobLauncher;
use crate::adapters::mailer::Mailer;
use crate::adapters::object_store::ObjectStore;
use crate::adapters::payment_gateway::PaymentGateway;
use crate::adapters::record_store::{CollectionStore, StoreError};
use crate::config::ServiceConfig;
use crate::error::HandlerError;

/// Values the handlers need from configuration, without the adapter secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub operator_secret: String,
    pub operator_email: String,
    pub app_url: String,
}

impl HandlerSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            operator_secret: config.operator_secret.clone(),
            operator_email: config.operator_email.clone(),
            app_url: config.app_url.clone(),
        }
    }
}

/// Everything a handler may touch. Built once per cold start by the binary
/// and per test by the fakes in `adapters::memory`.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub store: &'a dyn CollectionStore,
    pub objects: &'a dyn ObjectStore,
    pub mailer: &'a dyn Mailer,
    pub payments: &'a dyn PaymentGateway,
    pub jobs: &'a dyn JobLauncher,
    pub settings: &'a HandlerSettings,
}

/// Attempts at a record write before a concurrent modification is reported.
pub(crate) const WRITE_ATTEMPTS: usize = 3;

/// Applies `change` to `collection` and writes it. When another writer got
/// there first, the latest version is reloaded and `change` reapplied to it.
pub(crate) fn update_with_retry<F>(
    services: &Services<'_>,
    mut collection: Collection,
    change: F,
) -> Result<Collection, HandlerError>
where
    F: Fn(&mut Collection) -> Result<(), HandlerError>,
{
    change(&mut collection)?;
    let mut attempt = 1;
    loop {
        match services.store.update(&collection) {
            Ok(stored) => return Ok(stored),
            Err(StoreError::Conflict(collection_id)) if attempt < WRITE_ATTEMPTS => {
                tracing::info!(collection_id = %collection_id, attempt, "record changed underneath, retrying on the latest version");
                collection = find_collection(services, &collection_id)?
                    .ok_or_else(|| HandlerError::not_found("Collection not found"))?;
                change(&mut collection)?;
                attempt += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Loads a collection, treating an undecodable record as absent.
pub(crate) fn find_collection(
    services: &Services<'_>,
    collection_id: &str,
) -> Result<Option<Collection>, HandlerError> {
    match services.store.get(collection_id) {
        Ok(found) => Ok(found),
        Err(StoreError::Malformed(detail)) => {
            tracing::warn!(collection_id, detail = %detail, "ignoring malformed collection record");
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

/// Loads a collection and checks its capability token. Both failures are
/// reported as not found.
pub(crate) fn authorized_collection(
    services: &Services<'_>,
    credentials: &CollectionCredentials,
) -> Result<Collection, HandlerError> {
    let collection = find_collection(services, &credentials.collection_id)?
        .ok_or_else(|| HandlerError::not_found("Collection not found"))?;
    if !collection.secret_matches(&credentials.secret_key) {
        return Err(HandlerError::not_found("Invalid secret key"));
    }
    Ok(collection)
}

pub(crate) fn require_operator(
    settings: &HandlerSettings,
    candidate: Option<&str>,
) -> Result<(), HandlerError> {
    match candidate {
        Some(secret)
            if !settings.operator_secret.is_empty()
                && secrets_match(secret, &settings.operator_secret) =>
        {
            Ok(())
        }
        _ => Err(HandlerError::not_found("Invalid operator secret")),
    }
}

/// Compares two secrets in time independent of where they first differ.
fn secrets_match(candidate: &str, expected: &str) -> bool {
    let (candidate, expected) = (candidate.as_bytes(), expected.as_bytes());
    candidate.len() == expected.len()
        && candidate
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HandlerSettings {
        HandlerSettings {
            operator_secret: "operator".to_string(),
            operator_email: "ops@pawto.example".to_string(),
            app_url: "https://pawto.example".to_string(),
        }
    }

    #[test]
    fn operator_secret_must_match_exactly() {
        assert!(require_operator(&settings(), Some("operator")).is_ok());

        let error = require_operator(&settings(), Some("Operator")).expect_err("case matters");
        assert_eq!(error.status_code(), 404);
        assert!(require_operator(&settings(), None).is_err());
    }

    #[test]
    fn secret_comparison_checks_length_and_every_byte() {
        assert!(secrets_match("operator", "operator"));
        assert!(!secrets_match("operatoR", "operator"));
        assert!(!secrets_match("operator2", "operator"));
        assert!(!secrets_match("", "operator"));
    }

    #[test]
    fn empty_operator_secret_never_matches() {
        let mut settings = settings();
        settings.operator_secret.clear();
        assert!(require_operator(&settings, Some("")).is_err());
    }
}
