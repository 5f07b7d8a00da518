mod common;

use common::{harness, transfer_request};
use paytrail::domain::event::{EventSource, PAYMENT_CAPTURED};
use paytrail::domain::payment::{PaymentIntent, PaymentStatus};
use paytrail::domain::ports::SignatureVerifier;
use paytrail::error::{PaymentError, Result};
use rust_decimal_macros::dec;
use serde_json::json;

async fn authorized(h: &common::Harness) -> PaymentIntent {
    let intent = h.payments.create_intent(transfer_request(1)).await.unwrap();
    h.payments.authorize(intent.id).await.unwrap()
}

fn payload(event_type: &str, reference: &str) -> String {
    json!({ "eventType": event_type, "externalReference": reference }).to_string()
}

#[tokio::test]
async fn test_unknown_reference_is_acknowledged_and_dropped() {
    let h = harness(&[(1, dec!(100))]).await;
    let intent = authorized(&h).await;

    let receipt = h
        .payments
        .process_webhook("stripe", &payload("payment.captured", "PAY-UNKNOWN"), None)
        .await
        .unwrap();
    assert!(receipt.received);
    assert_eq!(h.payments.events(intent.id).await.unwrap().len(), 2);
    assert_eq!(
        h.payments.get(intent.id).await.unwrap().status,
        PaymentStatus::Authorized
    );
}

#[tokio::test]
async fn test_captured_webhook_captures_intent() {
    let h = harness(&[(1, dec!(100))]).await;
    let intent = authorized(&h).await;
    let reference = intent.external_reference.clone().unwrap();

    let body = payload("payment.captured", &reference);
    h.payments
        .process_webhook("stripe", &body, Some("sig"))
        .await
        .unwrap();

    let captured = h.payments.get(intent.id).await.unwrap();
    assert_eq!(captured.status, PaymentStatus::Captured);

    let events = h.payments.events(intent.id).await.unwrap();
    assert_eq!(events[0].event_type, "webhook.payment.captured");
    assert_eq!(events[0].source, EventSource::Webhook);
    assert_eq!(events[0].status, PaymentStatus::Captured);
    assert_eq!(events[0].payload, Some(serde_json::from_str(&body).unwrap()));
    assert_eq!(events[1].event_type, PAYMENT_CAPTURED);
    assert_eq!(events[1].source, EventSource::Webhook);
    assert_eq!(
        events[1].payload,
        Some(json!({ "note": "Captured via webhook" }))
    );
}

#[tokio::test]
async fn test_refund_webhook_with_amount() {
    let h = harness(&[(1, dec!(100))]).await;
    let intent = authorized(&h).await;
    let reference = intent.external_reference.clone().unwrap();
    h.payments.capture(intent.id, None).await.unwrap();

    let body = json!({
        "EventType": "PAYMENT.REFUNDED",
        "ExternalReference": reference,
        "Amount": 40,
        "Message": "chargeback",
    })
    .to_string();
    h.payments.process_webhook("stripe", &body, None).await.unwrap();

    let refunded = h.payments.get(intent.id).await.unwrap();
    assert_eq!(refunded.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(refunded.refunded_amount, dec!(40));
    let events = h.payments.events(intent.id).await.unwrap();
    assert_eq!(events[0].event_type, "webhook.PAYMENT.REFUNDED");
}

#[tokio::test]
async fn test_rejected_transition_still_records_webhook() {
    let h = harness(&[(1, dec!(100))]).await;
    let intent = authorized(&h).await;
    let reference = intent.external_reference.clone().unwrap();

    h.payments
        .process_webhook("stripe", &payload("payment.failed", &reference), None)
        .await
        .unwrap();

    assert_eq!(
        h.payments.get(intent.id).await.unwrap().status,
        PaymentStatus::Authorized
    );
    let events = h.payments.events(intent.id).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event_type, "webhook.payment.failed");
    assert_eq!(events[0].status, PaymentStatus::Authorized);
}

#[tokio::test]
async fn test_unrecognized_event_type_is_only_recorded() {
    let h = harness(&[(1, dec!(100))]).await;
    let intent = authorized(&h).await;
    let reference = intent.external_reference.clone().unwrap();

    let body = json!({ "externalReference": reference }).to_string();
    h.payments.process_webhook("paypal", &body, None).await.unwrap();

    let events = h.payments.events(intent.id).await.unwrap();
    assert_eq!(events[0].event_type, "webhook.unknown");
    assert_eq!(
        h.payments.get(intent.id).await.unwrap().status,
        PaymentStatus::Authorized
    );
}

#[tokio::test]
async fn test_payload_without_reference_is_invalid() {
    let h = harness(&[(1, dec!(100))]).await;
    for body in [
        json!({ "eventType": "payment.captured" }).to_string(),
        json!({ "eventType": "payment.captured", "externalReference": "" }).to_string(),
        "{".to_string(),
    ] {
        let err = h
            .payments
            .process_webhook("stripe", &body, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError(_)), "{body}");
    }
}

struct SharedSecret(&'static str);

impl SignatureVerifier for SharedSecret {
    fn verify(&self, _provider: &str, _payload: &str, signature: Option<&str>) -> Result<()> {
        if signature == Some(self.0) {
            Ok(())
        } else {
            Err(PaymentError::Unauthorized("invalid webhook signature".into()))
        }
    }
}

#[tokio::test]
async fn test_signature_verifier_guards_ingestion() {
    let h = harness(&[(1, dec!(100))]).await;
    let payments = h.payments.with_signature_verifier(Box::new(SharedSecret("s3cret")));
    let intent = payments.create_intent(transfer_request(1)).await.unwrap();
    let intent = payments.authorize(intent.id).await.unwrap();
    let body = payload("payment.captured", intent.external_reference.as_deref().unwrap());

    let err = payments
        .process_webhook("stripe", &body, Some("forged"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Unauthorized(_)));
    assert_eq!(payments.events(intent.id).await.unwrap().len(), 2);

    payments
        .process_webhook("stripe", &body, Some("s3cret"))
        .await
        .unwrap();
    assert_eq!(
        payments.get(intent.id).await.unwrap().status,
        PaymentStatus::Captured
    );
}
