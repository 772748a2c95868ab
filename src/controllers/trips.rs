use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{parse_seat_id, ApiResult};
use crate::services::{CreateTripRequest, SeatRef};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/{id}", get(get_trip))
        .route("/trips/{id}/seats/{seat_id}/label", patch(rename_seat))
        .route("/seats/swap", post(swap_seats))
}

// POST /api/trips
async fn create_trip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTripRequest>,
) -> ApiResult<impl IntoResponse> {
    let trip = state.engine.create_trip(req).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

// GET /api/trips/{id}
async fn get_trip(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_trip(id.into()).await?))
}

#[derive(Debug, Deserialize)]
struct RenameSeatRequest {
    label: String,
}

// PATCH /api/trips/{id}/seats/{seat_id}/label
async fn rename_seat(
    State(state): State<Arc<AppState>>,
    Path((id, seat_id)): Path<(Uuid, String)>,
    Json(req): Json<RenameSeatRequest>,
) -> ApiResult<impl IntoResponse> {
    let seat_id = parse_seat_id(&seat_id)?;
    Ok(Json(state.engine.rename_seat(id.into(), seat_id, req.label).await?))
}

#[derive(Debug, Deserialize)]
struct SwapRequest {
    from: SeatRef,
    to: SeatRef,
}

// POST /api/seats/swap
async fn swap_seats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwapRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.swap_seats(req.from, req.to).await?))
}
