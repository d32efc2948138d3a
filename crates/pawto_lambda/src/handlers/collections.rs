use std::time::Duration;

use chrono::Utc;
use pawto_core::collection::{
    generate_collection_id, generate_secret_key, timestamp, Collection, CollectionStatus,
    CollectionView,
};
use pawto_core::contract::{
    non_blank, CollectionCredentials, CollectionIdResponse, CreateCollectionRequest,
    CreateCollectionResponse, ResultImagesResponse, StartDatetimeRequest, StartDatetimeResponse,
    StatusUpdateRequest, INVALID_REQUEST_BODY,
};
use pawto_core::notification;
use pawto_core::storage_keys::{results_prefix, sort_result_keys, source_image_key};

use super::payment::cancel_payment;
use super::{authorized_collection, find_collection, require_operator, Services};
use crate::adapters::object_store::ObjectStore;
use crate::error::HandlerError;

pub const RESULT_URL_TTL: Duration = Duration::from_secs(60 * 60);
const SOURCE_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

pub fn create_collection(
    request: CreateCollectionRequest,
    services: &Services<'_>,
) -> Result<CreateCollectionResponse, HandlerError> {
    let draft = request.validate()?;
    let collection_id = generate_collection_id();
    let secret_key = generate_secret_key(&mut rand::thread_rng());

    let staged = stage_source_images(services.objects, &collection_id, &draft.images)?;
    let collection = Collection::new(
        collection_id.as_str(),
        draft.email,
        draft.name,
        draft.animal_type,
        secret_key,
        Utc::now(),
    );
    if let Err(error) = services.store.insert(&collection) {
        discard_objects(services.objects, &staged);
        return Err(error.into());
    }
    tracing::info!(
        collection_id = %collection.collection_id,
        images = staged.len(),
        "collection created"
    );

    services.mailer.send(&notification::collection_created(
        &collection,
        &services.settings.app_url,
    ))?;

    Ok(CreateCollectionResponse {
        collection_id: collection.collection_id,
        email: collection.email,
    })
}

/// Uploads every image or none of them.
fn stage_source_images(
    objects: &dyn ObjectStore,
    collection_id: &str,
    images: &[Vec<u8>],
) -> Result<Vec<String>, HandlerError> {
    let mut written = Vec::with_capacity(images.len());
    for (offset, image) in images.iter().enumerate() {
        let key = source_image_key(collection_id, offset + 1);
        if let Err(error) = objects.write_object(&key, image, SOURCE_IMAGE_CONTENT_TYPE) {
            discard_objects(objects, &written);
            return Err(error.into());
        }
        written.push(key);
    }
    Ok(written)
}

fn discard_objects(objects: &dyn ObjectStore, keys: &[String]) {
    for key in keys {
        if let Err(error) = objects.delete_object(key) {
            tracing::warn!(key = %key, error = %error, "failed to discard staged object");
        }
    }
}

pub fn read_collection(
    collection_id: Option<String>,
    services: &Services<'_>,
) -> Result<CollectionView, HandlerError> {
    let collection_id =
        non_blank(collection_id).ok_or_else(|| HandlerError::bad_request(INVALID_REQUEST_BODY))?;
    let collection = find_collection(services, &collection_id)?
        .ok_or_else(|| HandlerError::bad_request("Collection not found"))?;
    Ok(collection.view())
}

pub fn result_images(
    credentials: &CollectionCredentials,
    services: &Services<'_>,
) -> Result<ResultImagesResponse, HandlerError> {
    let collection = authorized_collection(services, credentials)?;
    if collection.collection_status != CollectionStatus::Completed {
        return Err(HandlerError::bad_request("Images are not ready yet"));
    }

    let mut keys: Vec<String> = services
        .objects
        .list_keys(&results_prefix(&collection.collection_id))?
        .into_iter()
        .filter(|key| !key.ends_with('/'))
        .collect();
    if keys.is_empty() {
        return Err(HandlerError::bad_request("No result images found"));
    }
    sort_result_keys(&mut keys);

    let images = keys
        .iter()
        .map(|key| services.objects.presign_get(key, RESULT_URL_TTL))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResultImagesResponse { images })
}

/// Operator callback driving the generation lifecycle.
pub fn update_collection_status(
    request: StatusUpdateRequest,
    services: &Services<'_>,
) -> Result<CollectionIdResponse, HandlerError> {
    require_operator(services.settings, request.runpod_secret_key.as_deref())?;
    let update = request.validate()?;
    let mut collection = authorized_collection(services, &update.credentials)?;

    let target = match update.target {
        1 => CollectionStatus::Processing,
        2 => CollectionStatus::Completed,
        3 => CollectionStatus::Error,
        other => {
            return Err(HandlerError::bad_request(format!(
                "Unsupported collection status {other}"
            )))
        }
    };
    collection.transition(target)?;
    let now = timestamp(Utc::now());
    if target == CollectionStatus::Processing {
        collection.start_datetime = now;
    } else {
        collection.end_datetime = now;
    }

    let stored = services.store.update(&collection)?;
    tracing::info!(
        collection_id = %stored.collection_id,
        status = %stored.collection_status,
        "collection status updated"
    );

    match target {
        CollectionStatus::Completed => {
            services.mailer.send(&notification::image_ready(
                &stored,
                &services.settings.app_url,
            ))?;
        }
        CollectionStatus::Error => {
            let outcome = cancel_payment(&stored.collection_id, services)?;
            tracing::info!(
                collection_id = %stored.collection_id,
                cancelled = outcome.result,
                message = %outcome.message,
                "payment cancellation after failed generation"
            );
        }
        _ => {}
    }

    Ok(CollectionIdResponse {
        collection_id: stored.collection_id,
    })
}

pub fn check_start_datetime(
    request: StartDatetimeRequest,
    services: &Services<'_>,
) -> Result<StartDatetimeResponse, HandlerError> {
    require_operator(services.settings, request.runpod_secret_key.as_deref())?;
    let credentials = request.credentials()?;
    let collection = authorized_collection(services, &credentials)?;
    Ok(StartDatetimeResponse {
        start_datetime: collection.start_datetime,
    })
}
