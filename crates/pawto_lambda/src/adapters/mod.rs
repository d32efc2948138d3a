use std::future::Future;

pub mod job_api;
pub mod mailer;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod object_store;
pub mod payment_gateway;
pub mod record_store;

/// Runs an SDK future to completion from the synchronous handler code.
///
/// Requires the multi-threaded tokio runtime the Lambda binary starts.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
