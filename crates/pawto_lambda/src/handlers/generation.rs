use pawto_core::collection::CollectionStatus;
use pawto_core::contract::{CollectionIdRequest, JobSubmissionResponse};
use pawto_core::job::JobDescriptor;

use super::{find_collection, Services};
use crate::adapters::job_api::submitted_job_id;
use crate::error::HandlerError;

/// Claims a paid collection and hands it to the GPU job endpoint.
///
/// The status moves to processing before submission, so a concurrent second
/// trigger fails its conditional write instead of launching a duplicate job.
pub fn trigger_generation(
    request: CollectionIdRequest,
    services: &Services<'_>,
) -> Result<JobSubmissionResponse, HandlerError> {
    let collection_id = request.validate()?;
    let mut collection = find_collection(services, &collection_id)?
        .ok_or_else(|| HandlerError::not_found("Collection not found"))?;
    if !collection.paid {
        return Err(HandlerError::bad_request("Collection is not paid"));
    }
    if collection.collection_status != CollectionStatus::Created {
        return Err(HandlerError::bad_request("Generation was already started"));
    }

    collection.transition(CollectionStatus::Processing)?;
    let claimed = services.store.update(&collection)?;

    let descriptor = JobDescriptor::for_collection(&claimed);
    let submission = services.jobs.submit(&descriptor).inspect_err(|error| {
        tracing::info!(
            collection_id = %claimed.collection_id,
            error = %error,
            "job submission failed; collection stays processing until the operator reports status 3"
        );
    })?;
    tracing::info!(
        collection_id = %claimed.collection_id,
        job_id = submitted_job_id(&submission).unwrap_or_default(),
        "generation job submitted"
    );

    if let Some(job_id) = submitted_job_id(&submission) {
        match services.jobs.poll_status(job_id) {
            Ok(status) => tracing::info!(job_id, status = %status, "generation job status"),
            Err(error) => tracing::warn!(job_id, error = %error, "generation job status unavailable"),
        }
    }

    Ok(JobSubmissionResponse {
        out_json: submission,
    })
}
