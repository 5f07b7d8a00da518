use axum::Json;
use axum::extract::{Path, State};

use super::AppState;
use super::dto::{ShipmentEventView, ShipmentView};
use crate::application::shipments::ShipRequest;
use crate::error::Result;

type ShipmentResult = Result<Json<ShipmentView>>;

pub async fn get(State(state): State<AppState>, Path(id): Path<u64>) -> ShipmentResult {
    Ok(Json(state.shipments.get(id).await?.into()))
}

pub async fn pack(State(state): State<AppState>, Path(id): Path<u64>) -> ShipmentResult {
    Ok(Json(state.shipments.pack(id).await?.into()))
}

pub async fn ship(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ShipRequest>,
) -> ShipmentResult {
    Ok(Json(state.shipments.ship(id, request).await?.into()))
}

pub async fn deliver(State(state): State<AppState>, Path(id): Path<u64>) -> ShipmentResult {
    Ok(Json(state.shipments.deliver(id).await?.into()))
}

pub async fn timeline(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<ShipmentEventView>>> {
    let events = state.shipments.timeline(id).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

pub async fn archive(State(state): State<AppState>, Path(id): Path<u64>) -> ShipmentResult {
    Ok(Json(state.shipments.archive(id).await?.into()))
}
