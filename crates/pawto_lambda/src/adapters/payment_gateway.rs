use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use thiserror::Error;

use super::block_on;

pub const DEFAULT_PAYMENT_API_BASE: &str = "https://api.tosspayments.com/v1";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,
    #[error("payment gateway request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest<'a> {
    pub payment_key: &'a str,
    pub order_id: &'a str,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Approved { receipt_url: String },
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Declined { reason: String },
}

pub trait PaymentGateway {
    fn confirm(&self, request: &ConfirmRequest<'_>) -> Result<ConfirmOutcome, GatewayError>;

    fn cancel(&self, payment_key: &str, reason: &str) -> Result<CancelOutcome, GatewayError>;
}

/// Toss Payments REST client.
pub struct TossPaymentGateway {
    http: reqwest::Client,
    api_base: String,
    authorization: String,
}

impl TossPaymentGateway {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            authorization: basic_authorization(secret_key),
        })
    }

    fn post(&self, url: String, body: Value) -> Result<(u16, Value), GatewayError> {
        let request = self
            .http
            .post(url)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);

        block_on(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            // Error responses are not always JSON.
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok::<_, GatewayError>((status, body))
        })
    }
}

impl PaymentGateway for TossPaymentGateway {
    fn confirm(&self, request: &ConfirmRequest<'_>) -> Result<ConfirmOutcome, GatewayError> {
        let (status, body) = self.post(
            format!("{}/payments/confirm", self.api_base),
            json!({
                "paymentKey": request.payment_key,
                "orderId": request.order_id,
                "amount": request.amount,
            }),
        )?;
        Ok(confirm_outcome(status, &body))
    }

    fn cancel(&self, payment_key: &str, reason: &str) -> Result<CancelOutcome, GatewayError> {
        let (status, body) = self.post(
            format!("{}/payments/{payment_key}/cancel", self.api_base),
            json!({ "cancelReason": reason }),
        )?;
        if status == 200 {
            Ok(CancelOutcome::Cancelled)
        } else {
            Ok(CancelOutcome::Declined {
                reason: decline_reason(status, &body),
            })
        }
    }
}

/// `Basic base64("{secret_key}:")`, the gateway's secret-key scheme.
pub fn basic_authorization(secret_key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{secret_key}:")))
}

pub fn confirm_outcome(status: u16, body: &Value) -> ConfirmOutcome {
    if status != 200 {
        return ConfirmOutcome::Declined {
            reason: decline_reason(status, body),
        };
    }
    match body
        .pointer("/receipt/url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
    {
        Some(url) => ConfirmOutcome::Approved {
            receipt_url: url.to_string(),
        },
        None => ConfirmOutcome::Declined {
            reason: "gateway response carried no receipt".to_string(),
        },
    }
}

fn decline_reason(status: u16, body: &Value) -> String {
    match body.get("message").and_then(Value::as_str) {
        Some(message) => format!("{message} (HTTP {status})"),
        None => format!("HTTP {status}"),
    }
}
