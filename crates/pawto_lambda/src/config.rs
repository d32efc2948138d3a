//! Environment-driven configuration for the API Lambda.

use std::time::Duration;

use thiserror::Error;

use crate::adapters::job_api::DEFAULT_JOB_API_BASE;
use crate::adapters::payment_gateway::DEFAULT_PAYMENT_API_BASE;

pub const DEFAULT_APP_URL: &str = "http://localhost:5173";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub collections_table: String,
    pub uploads_bucket: String,
    pub sender_email: String,
    pub operator_email: String,
    pub payment_secret_key: String,
    pub payment_api_base: String,
    pub operator_secret: String,
    pub job_api_key: String,
    pub job_endpoint_id: String,
    pub job_api_base: String,
    pub app_url: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("collections_table", &self.collections_table)
            .field("uploads_bucket", &self.uploads_bucket)
            .field("sender_email", &self.sender_email)
            .field("operator_email", &self.operator_email)
            .field("payment_api_base", &self.payment_api_base)
            .field("job_endpoint_id", &self.job_endpoint_id)
            .field("job_api_base", &self.job_api_base)
            .field("app_url", &self.app_url)
            .finish_non_exhaustive()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let sender_email = required("SENDER_EMAIL")?;
        Ok(Self {
            collections_table: required("COLLECTIONS_TABLE")?,
            uploads_bucket: required("UPLOADS_BUCKET")?,
            operator_email: optional("OPERATOR_EMAIL").unwrap_or_else(|| sender_email.clone()),
            sender_email,
            payment_secret_key: required("PAYMENT_SECRET_KEY")?,
            payment_api_base: optional("PAYMENT_API_BASE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_string()),
            operator_secret: required("RUNPOD_SECRET_KEY")?,
            job_api_key: required("RUNPOD_API_KEY")?,
            job_endpoint_id: required("RUNPOD_ENDPOINT_ID")?,
            job_api_base: optional("RUNPOD_API_BASE")
                .unwrap_or_else(|| DEFAULT_JOB_API_BASE.to_string()),
            app_url: optional("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
        })
    }
}
