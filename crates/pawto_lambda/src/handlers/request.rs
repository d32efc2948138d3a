use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pawto_core::contract::INVALID_REQUEST_BODY;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HandlerError;

/// The parts of an API Gateway proxy event the router cares about.
///
/// HTTP API (payload v2) events carry `requestContext.http.method` and
/// `rawPath`; REST API (v1) events carry `httpMethod` and `path`. Both are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn from_event(event: &Value) -> Result<Self, String> {
        let Some(object) = event.as_object() else {
            return Err("Request payload must be a JSON object".to_string());
        };

        let method = event
            .pointer("/requestContext/http/method")
            .or_else(|| object.get("httpMethod"))
            .and_then(Value::as_str)
            .ok_or_else(|| "Request method is missing".to_string())?
            .to_ascii_uppercase();
        let path = object
            .get("rawPath")
            .or_else(|| object.get("path"))
            .and_then(Value::as_str)
            .unwrap_or("/")
            .to_string();

        let query = object
            .get("queryStringParameters")
            .and_then(Value::as_object)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|(name, value)| {
                        value.as_str().map(|value| (name.clone(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let encoded = object
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let body = match object.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if encoded => {
                let bytes = STANDARD
                    .decode(text.trim())
                    .map_err(|_| INVALID_REQUEST_BODY.to_string())?;
                Some(String::from_utf8(bytes).map_err(|_| INVALID_REQUEST_BODY.to_string())?)
            }
            Some(Value::String(text)) => Some(text.clone()),
            // Direct invocations may hand over an already-parsed body.
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            method,
            path,
            query,
            body,
        })
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }

    /// Deserializes the body; an absent body reads as `{}` so that field
    /// validation reports what is missing.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let text = self
            .body
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or("{}");
        serde_json::from_str(text).map_err(|_| HandlerError::bad_request(INVALID_REQUEST_BODY))
    }
}
