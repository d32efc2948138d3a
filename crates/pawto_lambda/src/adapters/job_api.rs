use std::time::Duration;

use pawto_core::job::JobDescriptor;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use thiserror::Error;

use super::block_on;

pub const DEFAULT_JOB_API_BASE: &str = "https://api.runpod.ai/v2";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job API timed out")]
    Timeout,
    #[error("job API request failed: {0}")]
    Transport(String),
    #[error("job API rejected the request with HTTP {status}: {body}")]
    Rejected { status: u16, body: Value },
}

impl From<reqwest::Error> for JobError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Asynchronous GPU job endpoint.
pub trait JobLauncher {
    /// Submits a job and returns the raw submission response.
    fn submit(&self, descriptor: &JobDescriptor) -> Result<Value, JobError>;

    fn poll_status(&self, job_id: &str) -> Result<Value, JobError>;
}

pub struct RunpodJobLauncher {
    http: reqwest::Client,
    endpoint_url: String,
    bearer: String,
}

impl RunpodJobLauncher {
    pub fn new(
        api_base: &str,
        endpoint_id: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, JobError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint_url: format!("{}/{endpoint_id}", api_base.trim_end_matches('/')),
            bearer: format!("Bearer {api_key}"),
        })
    }

    fn read_json(request: reqwest::RequestBuilder) -> Result<Value, JobError> {
        block_on(async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            if status.is_success() {
                Ok::<_, JobError>(body)
            } else {
                Err(JobError::Rejected {
                    status: status.as_u16(),
                    body,
                })
            }
        })
    }
}

impl JobLauncher for RunpodJobLauncher {
    fn submit(&self, descriptor: &JobDescriptor) -> Result<Value, JobError> {
        let request = self
            .http
            .post(format!("{}/run", self.endpoint_url))
            .header(AUTHORIZATION, &self.bearer)
            .json(descriptor);
        Self::read_json(request)
    }

    fn poll_status(&self, job_id: &str) -> Result<Value, JobError> {
        let request = self
            .http
            .get(format!("{}/status/{job_id}", self.endpoint_url))
            .header(AUTHORIZATION, &self.bearer);
        Self::read_json(request)
    }
}

/// Job identifier from a submission response such as
/// `{"id": "...", "status": "IN_QUEUE"}`.
pub fn submitted_job_id(submission: &Value) -> Option<&str> {
    submission
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}
