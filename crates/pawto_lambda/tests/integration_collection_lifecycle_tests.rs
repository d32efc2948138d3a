mod support;

use pawto_core::collection::CollectionStatus;
use pawto_core::storage_keys::source_image_key;
use pawto_lambda::adapters::memory::InMemoryServices;
use serde_json::json;
use support::events;
use support::{call, create_collection, creation_body, pay, report_status};

#[test]
fn created_collection_reads_back_as_unpaid() {
    let harness = InMemoryServices::new();
    let response = call(
        &harness,
        events::post(
            "/createCollection",
            json!({
                "email": "a@b.com",
                "images": [support::TINY_IMAGE],
                "animalType": "dog",
                "name": "Rex"
            }),
        ),
    );
    assert_eq!(response.status_code, 200);
    let body = response.json_body();
    assert_eq!(body["email"], "a@b.com");
    let collection_id = body["collectionId"]
        .as_str()
        .expect("collectionId should be a string");
    assert!(!collection_id.is_empty());

    let response = call(
        &harness,
        events::get("/collections", &[("collectionId", collection_id)]),
    );
    assert_eq!(response.status_code, 200);
    let view = response.json_body();
    assert_eq!(view["collectionStatus"], "0");
    assert_eq!(view["paid"], false);
    assert_eq!(view["price"], 3900);
    assert!(view.get("secretKey").is_none());
}

#[test]
fn any_non_empty_image_count_is_accepted() {
    let harness = InMemoryServices::new();
    for count in [1, 7, 21] {
        let created = create_collection(&harness, count);
        let prefix = format!("{}/sks/", created.collection_id);
        let stored = harness
            .objects
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .count();
        assert_eq!(stored, count);
    }

    let response = call(&harness, events::post("/createCollection", creation_body(0)));
    assert_eq!(response.status_code, 400);
}

#[test]
fn invalid_email_is_rejected() {
    let harness = InMemoryServices::new();
    let mut body = creation_body(2);
    body["email"] = json!("not-an-email");

    let response = call(&harness, events::post("/createCollection", body));
    assert_eq!(response.status_code, 400);
    assert_eq!(response.json_body()["message"], "Invalid email format");
    assert!(harness.objects.keys().is_empty());
}

#[test]
fn failed_upload_rolls_back_every_image() {
    let harness = InMemoryServices::new();
    harness.objects.fail_after(5);

    let response = call(&harness, events::post("/createCollection", creation_body(10)));
    assert_eq!(response.status_code, 500);
    assert_eq!(response.json_body()["message"], "Internal server error");
    assert!(harness.objects.keys().is_empty());
    assert!(harness.store.is_empty());
    assert!(harness.mailer.sent().is_empty());
}

#[test]
fn full_generation_lifecycle() {
    let harness = InMemoryServices::new();
    let created = create_collection(&harness, 8);
    assert!(harness
        .objects
        .keys()
        .contains(&source_image_key(&created.collection_id, 8)));

    let response = pay(&harness, &created.collection_id, json!(3900));
    assert_eq!(response.status_code, 200);
    assert_eq!(response.json_body()["secretKey"], created.secret_key.as_str());

    let response = call(
        &harness,
        events::post("/execPod", json!({"collectionId": created.collection_id})),
    );
    assert_eq!(response.status_code, 200);
    assert_eq!(response.json_body()["outJson"]["status"], "IN_QUEUE");

    let response = report_status(&harness, &created, json!(1));
    assert_eq!(response.status_code, 200);

    let response = call(
        &harness,
        events::post(
            "/checkStartDatetime",
            json!({
                "collectionId": created.collection_id,
                "secretKey": created.secret_key,
                "runpodSecretKey": "operator"
            }),
        ),
    );
    assert_eq!(response.status_code, 200);
    assert!(response.json_body()["startDatetime"]
        .as_str()
        .is_some_and(|value| value.ends_with('Z')));

    for index in [3, 1, 2] {
        harness.objects.seed_object(
            &format!("{}/results/result ({index}).png", created.collection_id),
            b"png",
        );
    }
    let response = report_status(&harness, &created, json!("2"));
    assert_eq!(response.status_code, 200);

    let response = call(
        &harness,
        events::get(
            "/getImages",
            &[
                ("collectionId", created.collection_id.as_str()),
                ("secretKey", created.secret_key.as_str()),
            ],
        ),
    );
    assert_eq!(response.status_code, 200);
    let images = response.json_body()["images"]
        .as_array()
        .expect("images should be an array")
        .clone();
    assert_eq!(images.len(), 3);
    assert!(images[0]
        .as_str()
        .is_some_and(|url| url.contains("result (1).png")));
    assert!(images[2]
        .as_str()
        .is_some_and(|url| url.contains("result (3).png")));

    let stored = harness
        .store
        .snapshot(&created.collection_id)
        .expect("collection should exist");
    assert_eq!(stored.collection_status, CollectionStatus::Completed);
    assert_eq!(harness.mailer.sent_with_subject("ready").len(), 1);
}

#[test]
fn repeated_completion_sends_one_email() {
    let harness = InMemoryServices::new();
    let created = create_collection(&harness, 8);
    assert_eq!(report_status(&harness, &created, json!(1)).status_code, 200);
    assert_eq!(report_status(&harness, &created, json!(2)).status_code, 200);

    let response = report_status(&harness, &created, json!(2));
    assert_eq!(response.status_code, 400);
    assert_eq!(harness.mailer.sent_with_subject("ready").len(), 1);
}

#[test]
fn images_stay_hidden_until_completion() {
    let harness = InMemoryServices::new();
    let created = create_collection(&harness, 8);
    harness.objects.seed_object(
        &format!("{}/results/result (1).png", created.collection_id),
        b"png",
    );

    let response = call(
        &harness,
        events::get(
            "/getImages",
            &[
                ("collectionId", created.collection_id.as_str()),
                ("secretKey", created.secret_key.as_str()),
            ],
        ),
    );
    assert_eq!(response.status_code, 400);

    let response = call(
        &harness,
        events::get(
            "/getImages",
            &[
                ("collectionId", created.collection_id.as_str()),
                ("secretKey", "wrong1"),
            ],
        ),
    );
    assert_eq!(response.status_code, 404);
}

#[test]
fn operator_endpoints_hide_behind_not_found() {
    let harness = InMemoryServices::new();
    let created = create_collection(&harness, 8);

    let response = call(
        &harness,
        events::post(
            "/updateCollectionStatus",
            json!({
                "collectionId": created.collection_id,
                "secretKey": created.secret_key,
                "collectionStatus": 1,
                "runpodSecretKey": "guess"
            }),
        ),
    );
    assert_eq!(response.status_code, 404);

    let stored = harness
        .store
        .snapshot(&created.collection_id)
        .expect("collection should exist");
    assert_eq!(stored.collection_status, CollectionStatus::Created);
}
