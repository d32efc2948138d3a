use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};

/// API Gateway HTTP API (payload v2) event without a body.
pub fn request(method: &str, path: &str) -> Value {
    json!({
        "version": "2.0",
        "rawPath": path,
        "requestContext": {"http": {"method": method, "path": path}},
        "isBase64Encoded": false
    })
}

pub fn get(path: &str, query: &[(&str, &str)]) -> Value {
    let mut event = request("GET", path);
    let params: Map<String, Value> = query
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect();
    if !params.is_empty() {
        event["queryStringParameters"] = Value::Object(params);
    }
    event
}

pub fn post(path: &str, body: Value) -> Value {
    post_raw(path, &body.to_string())
}

pub fn post_raw(path: &str, body: &str) -> Value {
    let mut event = request("POST", path);
    event["body"] = Value::String(body.to_string());
    event
}

pub fn post_base64(path: &str, body: Value) -> Value {
    let mut event = request("POST", path);
    event["body"] = Value::String(STANDARD.encode(body.to_string()));
    event["isBase64Encoded"] = Value::Bool(true);
    event
}
