use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use super::ApiResult;
use crate::services::{AdjustmentRequest, BookingRequest, PatchTicketRequest, TransferRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/bookings/{id}/transfer", post(transfer_seats))
        .route("/bookings/{id}/tickets", patch(patch_ticket))
        .route("/bookings/{id}/adjustments", post(record_adjustment))
        .route("/bookings/{id}/audit", get(booking_audit))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.engine.create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// GET /api/bookings/{id}
async fn get_booking(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_booking(id.into()).await?))
}

// PUT /api/bookings/{id}
async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.update_booking(id.into(), req).await?))
}

// DELETE /api/bookings/{id}
async fn delete_booking(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.delete_booking(id.into()).await?))
}

// POST /api/bookings/{id}/transfer
async fn transfer_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.transfer_seats(id.into(), req).await?))
}

// PATCH /api/bookings/{id}/tickets
async fn patch_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchTicketRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.patch_ticket(id.into(), req).await?))
}

// POST /api/bookings/{id}/adjustments
async fn record_adjustment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdjustmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let payment = state.engine.record_adjustment(id.into(), req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

// GET /api/bookings/{id}/audit
async fn booking_audit(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.audit_log(Some(id.into())).await?))
}
