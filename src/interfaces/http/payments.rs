use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use super::AppState;
use super::extract::JsonBody;
use super::dto::{
    ConfirmThreeDSecureRequest, NoteRequest, PaymentEventView, PaymentIntentView, ReasonRequest,
    RefundRequest, WebhookRequest,
};
use crate::application::webhook::WebhookReceipt;
use crate::domain::payment::{CreateIntentRequest, RefundOutcome};
use crate::error::Result;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type IntentResult = Result<Json<PaymentIntentView>>;

pub async fn create_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<PaymentIntentView>)> {
    let intent = state.payments.create_intent(request).await?;
    Ok((StatusCode::CREATED, Json(intent.into())))
}

pub async fn get_intent(State(state): State<AppState>, Path(id): Path<Uuid>) -> IntentResult {
    Ok(Json(state.payments.get(id).await?.into()))
}

pub async fn get_by_order(State(state): State<AppState>, Path(order_id): Path<u64>) -> IntentResult {
    Ok(Json(state.payments.get_by_order(order_id).await?.into()))
}

pub async fn get_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> IntentResult {
    Ok(Json(state.payments.get_by_reference(&reference).await?.into()))
}

pub async fn authorize(State(state): State<AppState>, Path(id): Path<Uuid>) -> IntentResult {
    Ok(Json(state.payments.authorize(id).await?.into()))
}

pub async fn capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<NoteRequest>,
) -> IntentResult {
    Ok(Json(state.payments.capture(id, body.note).await?.into()))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReasonRequest>,
) -> IntentResult {
    Ok(Json(state.payments.cancel(id, body.reason).await?.into()))
}

pub async fn fail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReasonRequest>,
) -> IntentResult {
    Ok(Json(state.payments.fail(id, body.reason).await?.into()))
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<RefundRequest>,
) -> Result<Json<RefundOutcome>> {
    Ok(Json(state.payments.refund(id, body.amount, body.reason).await?))
}

pub async fn confirm_3d_secure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmThreeDSecureRequest>,
) -> IntentResult {
    Ok(Json(
        state.payments.confirm_3d_secure(id, &body.result).await?.into(),
    ))
}

pub async fn mark_received(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<NoteRequest>,
) -> IntentResult {
    Ok(Json(state.payments.mark_received(id, body.note).await?.into()))
}

pub async fn simulate_success(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<NoteRequest>,
) -> IntentResult {
    Ok(Json(state.payments.simulate_success(id, body.note).await?.into()))
}

pub async fn simulate_fail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<ReasonRequest>,
) -> IntentResult {
    Ok(Json(state.payments.simulate_fail(id, body.reason).await?.into()))
}

pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentEventView>>> {
    let events = state.payments.events(id).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// The body's signature wins over the `X-Webhook-Signature` header.
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(body): Json<WebhookRequest>,
) -> Result<Json<WebhookReceipt>> {
    let signature = body.signature.clone().or_else(|| {
        headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });
    let receipt = state
        .payments
        .process_webhook(&provider, &body.raw_payload(), signature.as_deref())
        .await?;
    Ok(Json(receipt))
}
