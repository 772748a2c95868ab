pub mod bookings;
pub mod maintenance;
pub mod trips;

use axum::Router;
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::SeatId;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(trips::routes())
        .merge(bookings::routes())
        .merge(maintenance::routes())
}

/// Handler result; errors render through `EngineError`'s `IntoResponse`.
pub type ApiResult<T> = Result<T, EngineError>;

pub(crate) fn parse_seat_id(raw: &str) -> ApiResult<SeatId> {
    raw.parse()
        .map_err(|e: crate::models::ParseSeatIdError| EngineError::InvalidRequest(e.to_string()))
}
