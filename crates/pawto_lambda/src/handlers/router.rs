use pawto_core::contract::CollectionCredentials;
use serde::Serialize;
use serde_json::Value;

use super::collections::{
    check_start_datetime, create_collection, read_collection, result_images,
    update_collection_status,
};
use super::generation::trigger_generation;
use super::payment::{cancel_payment_request, confirm_payment};
use super::request::ApiRequest;
use super::response::{
    error_response, handler_error_response, preflight_response, success_response,
    ApiGatewayResponse,
};
use super::Services;
use crate::error::HandlerError;

/// Fixed body for requests that match no route.
pub const UNKNOWN_ROUTE_MESSAGE: &str = "Bad request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ReadCollection,
    ResultImages,
    CreateCollection,
    UpdateCollectionStatus,
    ConfirmPayment,
    TriggerGeneration,
    CheckStartDatetime,
    CancelPayment,
}

impl Route {
    pub fn resolve(method: &str, path: &str) -> Option<Self> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        match (method, path) {
            ("GET", "/collections") => Some(Self::ReadCollection),
            ("GET", "/getImages") => Some(Self::ResultImages),
            ("POST", "/createCollection") => Some(Self::CreateCollection),
            ("POST", "/updateCollectionStatus") => Some(Self::UpdateCollectionStatus),
            ("POST", "/payment") => Some(Self::ConfirmPayment),
            ("POST", "/execPod") => Some(Self::TriggerGeneration),
            ("POST", "/checkStartDatetime") => Some(Self::CheckStartDatetime),
            ("POST", "/cancelPayment") => Some(Self::CancelPayment),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadCollection => "read_collection",
            Self::ResultImages => "result_images",
            Self::CreateCollection => "create_collection",
            Self::UpdateCollectionStatus => "update_collection_status",
            Self::ConfirmPayment => "confirm_payment",
            Self::TriggerGeneration => "trigger_generation",
            Self::CheckStartDatetime => "check_start_datetime",
            Self::CancelPayment => "cancel_payment",
        }
    }
}

pub fn handle_api_event(event: Value, services: &Services<'_>) -> ApiGatewayResponse {
    let request = match ApiRequest::from_event(&event) {
        Ok(value) => value,
        Err(message) => return error_response(400, &message),
    };
    if request.method == "OPTIONS" {
        return preflight_response();
    }

    let Some(route) = Route::resolve(&request.method, &request.path) else {
        tracing::info!(method = %request.method, path = %request.path, "no route matched");
        return error_response(404, UNKNOWN_ROUTE_MESSAGE);
    };

    let span = tracing::info_span!("route", route = route.name());
    let _entered = span.enter();
    match dispatch(route, &request, services) {
        Ok(response) => response,
        Err(error) => handler_error_response(&error),
    }
}

fn dispatch(
    route: Route,
    request: &ApiRequest,
    services: &Services<'_>,
) -> Result<ApiGatewayResponse, HandlerError> {
    match route {
        Route::ReadCollection => ok(read_collection(
            request.query_param("collectionId"),
            services,
        )?),
        Route::ResultImages => {
            let credentials = CollectionCredentials::from_parts(
                request.query_param("collectionId"),
                request.query_param("secretKey"),
            )?;
            ok(result_images(&credentials, services)?)
        }
        Route::CreateCollection => ok(create_collection(request.json_body()?, services)?),
        Route::UpdateCollectionStatus => {
            ok(update_collection_status(request.json_body()?, services)?)
        }
        Route::ConfirmPayment => ok(confirm_payment(request.json_body()?, services)?),
        Route::TriggerGeneration => ok(trigger_generation(request.json_body()?, services)?),
        Route::CheckStartDatetime => ok(check_start_datetime(request.json_body()?, services)?),
        Route::CancelPayment => ok(cancel_payment_request(request.json_body()?, services)?),
    }
}

fn ok(payload: impl Serialize) -> Result<ApiGatewayResponse, HandlerError> {
    Ok(success_response(200, payload))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::adapters::memory::InMemoryServices;

    fn event(method: &str, path: &str) -> Value {
        json!({
            "rawPath": path,
            "requestContext": {"http": {"method": method}}
        })
    }

    #[test]
    fn resolves_every_route() {
        assert_eq!(Route::resolve("GET", "/collections"), Some(Route::ReadCollection));
        assert_eq!(Route::resolve("GET", "/getImages/"), Some(Route::ResultImages));
        assert_eq!(Route::resolve("POST", "/execPod"), Some(Route::TriggerGeneration));
        assert_eq!(Route::resolve("POST", "/cancelPayment"), Some(Route::CancelPayment));
        assert_eq!(Route::resolve("POST", "/collections"), None);
        assert_eq!(Route::resolve("GET", "/"), None);
    }

    #[test]
    fn unknown_routes_get_the_fixed_body() {
        let fixture = InMemoryServices::new();
        let response = handle_api_event(event("DELETE", "/collections"), &fixture.services());

        assert_eq!(response.status_code, 404);
        assert_eq!(
            response.json_body(),
            json!({"error": true, "message": "Bad request."})
        );
    }

    #[test]
    fn answers_preflight_requests() {
        let fixture = InMemoryServices::new();
        let response = handle_api_event(event("options", "/payment"), &fixture.services());
        assert_eq!(response.status_code, 204);
    }

    #[test]
    fn missing_collection_id_is_a_bad_request() {
        let fixture = InMemoryServices::new();
        let response = handle_api_event(event("GET", "/collections"), &fixture.services());

        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.json_body(),
            json!({"error": true, "message": "Invalid request body"})
        );
    }
}
