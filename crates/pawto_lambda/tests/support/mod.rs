#![allow(dead_code)]

pub mod events;

use pawto_lambda::adapters::memory::InMemoryServices;
use pawto_lambda::handlers::response::ApiGatewayResponse;
use pawto_lambda::handlers::router::handle_api_event;
use serde_json::{json, Value};

/// Base64 of a few JPEG magic bytes; content is never inspected server-side.
pub const TINY_IMAGE: &str = "/9j/4AAQSkZJRg==";

/// Runs one event through the router against the in-memory adapters.
pub fn call(harness: &InMemoryServices, event: Value) -> ApiGatewayResponse {
    handle_api_event(event, &harness.services())
}

pub fn creation_body(images: usize) -> Value {
    json!({
        "email": "owner@pawto.example",
        "name": "Rex",
        "animalType": "dog",
        "images": vec![TINY_IMAGE; images],
    })
}

/// A freshly created collection: identifier and capability token.
pub struct CreatedCollection {
    pub collection_id: String,
    pub secret_key: String,
}

pub fn create_collection(harness: &InMemoryServices, images: usize) -> CreatedCollection {
    let response = call(
        harness,
        events::post("/createCollection", creation_body(images)),
    );
    assert_eq!(response.status_code, 200, "creation failed: {}", response.body);

    let collection_id = response.json_body()["collectionId"]
        .as_str()
        .expect("collectionId should be a string")
        .to_string();
    let secret_key = harness
        .store
        .snapshot(&collection_id)
        .expect("created collection should be stored")
        .secret_key;
    CreatedCollection {
        collection_id,
        secret_key,
    }
}

pub fn pay(harness: &InMemoryServices, collection_id: &str, price: Value) -> ApiGatewayResponse {
    call(
        harness,
        events::post(
            "/payment",
            json!({"collectionId": collection_id, "paymentKey": "pay-1", "price": price}),
        ),
    )
}

pub fn report_status(
    harness: &InMemoryServices,
    created: &CreatedCollection,
    status: Value,
) -> ApiGatewayResponse {
    call(
        harness,
        events::post(
            "/updateCollectionStatus",
            json!({
                "collectionId": created.collection_id,
                "secretKey": created.secret_key,
                "collectionStatus": status,
                "runpodSecretKey": harness.settings.operator_secret,
            }),
        ),
    )
}
