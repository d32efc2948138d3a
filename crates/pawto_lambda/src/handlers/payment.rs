use pawto_core::collection::{AlreadyPaid, CollectionStatus, BASE_PRICE};
use pawto_core::contract::{
    CancelPaymentResponse, CollectionIdRequest, PaymentRequest, PaymentResponse,
};
use pawto_core::notification;

use super::{find_collection, update_with_retry, Services};
use crate::adapters::payment_gateway::{CancelOutcome, ConfirmOutcome, ConfirmRequest};
use crate::adapters::record_store::StoreError;
use crate::error::HandlerError;

const CANCEL_REASON: &str = "Album generation failed";
const UNRECORDED_REASON: &str = "Payment could not be recorded";

pub fn confirm_payment(
    request: PaymentRequest,
    services: &Services<'_>,
) -> Result<PaymentResponse, HandlerError> {
    let confirmation = request.validate()?;
    let collection = find_collection(services, &confirmation.collection_id)?
        .ok_or_else(|| HandlerError::not_found("Collection not found"))?;
    if collection.paid {
        return Err(AlreadyPaid.into());
    }
    if confirmation.price != BASE_PRICE {
        tracing::warn!(
            collection_id = %collection.collection_id,
            price = confirmation.price,
            "payment amount does not match the collection price"
        );
        return Err(HandlerError::bad_request("Price mismatch"));
    }

    // The gateway is always asked for the server-side price.
    let outcome = services.payments.confirm(&ConfirmRequest {
        payment_key: &confirmation.payment_key,
        order_id: &collection.collection_id,
        amount: BASE_PRICE,
    });
    let receipt = match outcome {
        Ok(ConfirmOutcome::Approved { receipt_url }) => receipt_url,
        Ok(ConfirmOutcome::Declined { reason }) => {
            tracing::warn!(collection_id = %collection.collection_id, reason = %reason, "payment declined");
            return Err(HandlerError::bad_request(format!(
                "Payment confirmation failed: {reason}"
            )));
        }
        Err(error) => {
            tracing::warn!(collection_id = %collection.collection_id, error = %error, "payment gateway unreachable");
            return Err(HandlerError::bad_request(format!(
                "Payment confirmation failed: {error}"
            )));
        }
    };

    let collection_id = collection.collection_id.clone();
    let recorded = update_with_retry(services, collection, |record| {
        if record.paid && record.payment_key == confirmation.payment_key {
            return Ok(());
        }
        record
            .record_payment(confirmation.payment_key.as_str(), BASE_PRICE, receipt.as_str())
            .map_err(HandlerError::from)
    });
    let stored = match recorded {
        Ok(stored) => stored,
        // A backend failure may still have applied the write, so only a
        // definite miss is refunded.
        Err(error @ HandlerError::Store(StoreError::Backend(_))) => {
            tracing::error!(
                collection_id = %collection_id,
                payment_key = %confirmation.payment_key,
                error = %error,
                "captured payment may be unrecorded"
            );
            return Err(error);
        }
        Err(error) => {
            refund_unrecorded(services, &collection_id, &confirmation.payment_key);
            return Err(error);
        }
    };
    tracing::info!(collection_id = %stored.collection_id, "payment recorded");

    services.mailer.send(&notification::payment_confirmed(
        &stored,
        &services.settings.app_url,
    ))?;
    services.mailer.send(&notification::operator_payment_alert(
        &stored,
        &services.settings.operator_email,
    ))?;

    Ok(PaymentResponse {
        receipt: stored.receipt,
        secret_key: stored.secret_key,
    })
}

pub fn cancel_payment_request(
    request: CollectionIdRequest,
    services: &Services<'_>,
) -> Result<CancelPaymentResponse, HandlerError> {
    let collection_id = request.validate()?;
    cancel_payment(&collection_id, services)
}

/// Refunds a failed collection. Refusals are reported in the response rather
/// than as errors; only storage and mail failures propagate.
pub fn cancel_payment(
    collection_id: &str,
    services: &Services<'_>,
) -> Result<CancelPaymentResponse, HandlerError> {
    let Some(collection) = find_collection(services, collection_id)? else {
        return Ok(refused("Collection not found"));
    };
    if collection.collection_status != CollectionStatus::Error {
        return Ok(refused("Only failed collections can be refunded"));
    }
    if collection.payment_key.is_empty() {
        return Ok(refused("Collection has no payment to cancel"));
    }

    match services.payments.cancel(&collection.payment_key, CANCEL_REASON) {
        Ok(CancelOutcome::Cancelled) => {}
        Ok(CancelOutcome::Declined { reason }) => {
            tracing::warn!(collection_id, reason = %reason, "payment cancellation declined");
            return Ok(refused(format!("Payment cancellation failed: {reason}")));
        }
        Err(error) => {
            tracing::warn!(collection_id, error = %error, "payment gateway unreachable");
            return Ok(refused(format!("Payment cancellation failed: {error}")));
        }
    }

    let stored = update_with_retry(services, collection, |record| {
        record
            .transition(CollectionStatus::Cancelled)
            .map_err(HandlerError::from)
    })
    .inspect_err(|error| {
        tracing::error!(collection_id, error = %error, "refunded payment could not be recorded");
    })?;
    tracing::info!(collection_id = %stored.collection_id, "payment cancelled");
    services
        .mailer
        .send(&notification::payment_cancelled(&stored))?;

    Ok(CancelPaymentResponse {
        result: true,
        message: "Payment cancelled".to_string(),
    })
}

/// Returns money the gateway captured for a payment the record never kept.
fn refund_unrecorded(services: &Services<'_>, collection_id: &str, payment_key: &str) {
    match services.payments.cancel(payment_key, UNRECORDED_REASON) {
        Ok(CancelOutcome::Cancelled) => {
            tracing::warn!(collection_id, payment_key, "refunded a payment that could not be recorded");
        }
        Ok(CancelOutcome::Declined { reason }) => {
            tracing::error!(collection_id, payment_key, reason = %reason, "unrecorded payment could not be refunded");
        }
        Err(error) => {
            tracing::error!(collection_id, payment_key, error = %error, "unrecorded payment could not be refunded");
        }
    }
}

fn refused(message: impl Into<String>) -> CancelPaymentResponse {
    CancelPaymentResponse {
        result: false,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pawto_core::collection::Collection;
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::memory::InMemoryServices;
    use crate::handlers::WRITE_ATTEMPTS;

    fn with_collection(configure: impl FnOnce(&mut Collection)) -> InMemoryServices {
        let fixture = InMemoryServices::new();
        let mut collection = Collection::new(
            "c-1",
            "owner@pawto.example",
            "Rex",
            "dog",
            "abc123",
            Utc::now(),
        );
        configure(&mut collection);
        fixture.store.seed(collection);
        fixture
    }

    fn payment(price: Value) -> PaymentRequest {
        serde_json::from_value(json!({
            "collectionId": "c-1",
            "paymentKey": "pay-1",
            "price": price
        }))
        .expect("request should deserialize")
    }

    fn failed_and_paid(collection: &mut Collection) {
        collection.collection_status = CollectionStatus::Error;
        collection.paid = true;
        collection.payment_key = "pay-1".to_string();
    }

    #[test]
    fn confirms_with_the_server_price_and_notifies_both_parties() {
        let fixture = with_collection(|_| {});

        let response = confirm_payment(payment(json!("3900")), &fixture.services())
            .expect("payment should confirm");
        assert_eq!(response.receipt, "https://receipts.test/1");
        assert_eq!(response.secret_key, "abc123");

        let confirmations = fixture.payments.confirmations();
        assert_eq!(confirmations.len(), 1);
        assert_eq!(confirmations[0].amount, BASE_PRICE);
        assert_eq!(confirmations[0].order_id, "c-1");

        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert!(stored.paid);
        assert_eq!(stored.payment_key, "pay-1");

        let recipients: Vec<String> = fixture
            .mailer
            .sent()
            .into_iter()
            .map(|message| message.to)
            .collect();
        assert_eq!(recipients, vec!["owner@pawto.example", "ops@pawto.example"]);
    }

    #[test]
    fn second_payment_is_rejected() {
        let fixture = with_collection(|_| {});
        confirm_payment(payment(json!(3900)), &fixture.services()).expect("first payment");

        let error = confirm_payment(payment(json!(3900)), &fixture.services())
            .expect_err("already paid");
        assert_eq!(error.public_message(), "Already paid");
        assert_eq!(fixture.payments.confirmations().len(), 1);
    }

    #[test]
    fn wrong_price_never_reaches_the_gateway() {
        let fixture = with_collection(|_| {});

        let error = confirm_payment(payment(json!(100)), &fixture.services())
            .expect_err("price mismatch");
        assert_eq!(error.status_code(), 400);
        assert!(fixture.payments.confirmations().is_empty());
        assert!(!fixture.store.snapshot("c-1").expect("record exists").paid);
    }

    #[test]
    fn declined_payment_leaves_collection_unpaid() {
        let fixture = with_collection(|_| {});
        fixture.payments.respond_to_confirm(ConfirmOutcome::Declined {
            reason: "card rejected".to_string(),
        });

        let error = confirm_payment(payment(json!(3900)), &fixture.services())
            .expect_err("gateway declined");
        assert_eq!(error.status_code(), 400);
        assert!(error.public_message().contains("card rejected"));
        assert!(!fixture.store.snapshot("c-1").expect("record exists").paid);
        assert!(fixture.mailer.sent().is_empty());
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let fixture = with_collection(|_| {});
        let request: PaymentRequest = serde_json::from_value(json!({
            "collectionId": "missing",
            "paymentKey": "pay-1",
            "price": 3900
        }))
        .expect("request should deserialize");

        let error = confirm_payment(request, &fixture.services()).expect_err("no such record");
        assert_eq!(error.status_code(), 404);
    }

    #[test]
    fn cancels_failed_paid_collections() {
        let fixture = with_collection(failed_and_paid);

        let response = cancel_payment("c-1", &fixture.services()).expect("cancellation runs");
        assert!(response.result);
        assert_eq!(fixture.payments.cancellations(), vec!["pay-1".to_string()]);

        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert_eq!(stored.collection_status, CollectionStatus::Cancelled);
        assert_eq!(fixture.mailer.sent_with_subject("cancelled").len(), 1);
    }

    #[test]
    fn refuses_cancellation_outside_the_error_state() {
        let fixture = with_collection(|collection| {
            collection.paid = true;
            collection.payment_key = "pay-1".to_string();
        });

        let response = cancel_payment("c-1", &fixture.services()).expect("cancellation runs");
        assert!(!response.result);
        assert!(fixture.payments.cancellations().is_empty());

        let response = cancel_payment("missing", &fixture.services()).expect("cancellation runs");
        assert!(!response.result);
    }

    #[test]
    fn refuses_cancellation_without_a_payment_key() {
        let fixture = with_collection(|collection| {
            collection.collection_status = CollectionStatus::Error;
        });

        let response = cancel_payment("c-1", &fixture.services()).expect("cancellation runs");
        assert!(!response.result);
        assert!(fixture.payments.cancellations().is_empty());
    }

    #[test]
    fn gateway_refusal_keeps_the_error_state() {
        let fixture = with_collection(failed_and_paid);
        fixture.payments.respond_to_cancel(CancelOutcome::Declined {
            reason: "already refunded".to_string(),
        });

        let response = cancel_payment("c-1", &fixture.services()).expect("cancellation runs");
        assert!(!response.result);
        assert!(response.message.contains("already refunded"));
        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert_eq!(stored.collection_status, CollectionStatus::Error);
        assert!(fixture.mailer.sent().is_empty());
    }

    #[test]
    fn payment_is_recorded_on_top_of_a_concurrent_status_write() {
        let fixture = with_collection(|_| {});
        fixture.store.interleave_write(|record| {
            record.start_datetime = "2026-10-19 09:00:00".to_string();
        });

        confirm_payment(payment(json!(3900)), &fixture.services()).expect("retry should land");

        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert!(stored.paid);
        assert_eq!(stored.start_datetime, "2026-10-19 09:00:00");
        assert_eq!(stored.version, 2);
        assert!(fixture.payments.cancellations().is_empty());
        assert_eq!(fixture.mailer.sent().len(), 2);
    }

    #[test]
    fn payment_recorded_by_another_writer_is_refunded() {
        let fixture = with_collection(|_| {});
        fixture.store.interleave_write(|record| {
            record.paid = true;
            record.payment_key = "pay-other".to_string();
        });

        let error = confirm_payment(payment(json!(3900)), &fixture.services())
            .expect_err("record already paid");
        assert_eq!(error.public_message(), "Already paid");
        assert_eq!(fixture.payments.cancellations(), vec!["pay-1".to_string()]);

        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert_eq!(stored.payment_key, "pay-other");
        assert!(fixture.mailer.sent().is_empty());
    }

    #[test]
    fn exhausted_write_retries_refund_the_payment() {
        let fixture = with_collection(|_| {});
        for _ in 0..WRITE_ATTEMPTS {
            fixture.store.interleave_write(|_| {});
        }

        let error = confirm_payment(payment(json!(3900)), &fixture.services())
            .expect_err("every write conflicts");
        assert_eq!(error.status_code(), 409);
        assert_eq!(fixture.payments.cancellations(), vec!["pay-1".to_string()]);
        assert!(!fixture.store.snapshot("c-1").expect("record exists").paid);
    }

    #[test]
    fn cancellation_is_recorded_on_top_of_a_concurrent_write() {
        let fixture = with_collection(failed_and_paid);
        fixture.store.interleave_write(|record| {
            record.end_datetime = "2026-10-19 10:00:00".to_string();
        });

        let response = cancel_payment("c-1", &fixture.services()).expect("cancellation runs");
        assert!(response.result);

        let stored = fixture.store.snapshot("c-1").expect("record exists");
        assert_eq!(stored.collection_status, CollectionStatus::Cancelled);
        assert_eq!(stored.end_datetime, "2026-10-19 10:00:00");
        assert_eq!(fixture.mailer.sent_with_subject("cancelled").len(), 1);
    }
}
