use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::ApiResult;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/maintenance/seat-sync", post(seat_sync))
        .route("/maintenance/payment-cleanup", post(payment_cleanup))
        .route("/audit", get(list_audit))
}

// POST /api/maintenance/seat-sync
async fn seat_sync(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.reconcile_seats().await?))
}

// POST /api/maintenance/payment-cleanup
async fn payment_cleanup(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.cleanup_payments().await?))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    booking_id: Option<Uuid>,
}

// GET /api/audit?booking_id=
async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.audit_log(query.booking_id.map(Into::into)).await?))
}
