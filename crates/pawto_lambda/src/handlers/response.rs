use pawto_core::contract::ErrorBody;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::HandlerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    /// Parsed body, or `Value::Null` for empty and non-JSON bodies.
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

fn default_headers() -> Value {
    json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*",
        "Access-Control-Allow-Headers": "Content-Type",
        "Access-Control-Allow-Methods": "GET,POST,OPTIONS",
    })
}

pub fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string(&payload) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: default_headers(),
            body,
        },
        Err(error) => {
            tracing::error!(error = %error, "response payload failed to serialize");
            error_response(500, "Internal server error")
        }
    }
}

pub fn error_response(status_code: u16, message: &str) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: default_headers(),
        body: json!(ErrorBody::new(message)).to_string(),
    }
}

pub fn preflight_response() -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 204,
        headers: default_headers(),
        body: String::new(),
    }
}

pub fn handler_error_response(error: &HandlerError) -> ApiGatewayResponse {
    let status_code = error.status_code();
    if status_code >= 500 {
        tracing::error!(status_code, error = %error, "request failed");
    } else {
        tracing::info!(status_code, error = %error, "request rejected");
    }
    error_response(status_code, &error.public_message())
}
