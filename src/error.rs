use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::{BookingId, SeatId, TripId};
use crate::store::StoreError;

/// Failure classes callers react to. Validation and not-found are rejected
/// before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidOperation,
    Conflict,
    Storage,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("trip {trip_id}: paid tickets need an itemized price for every seat")]
    MissingTicketDetail { trip_id: TripId },

    #[error("seat {seat_id} appears more than once in the request")]
    DuplicateSeat { seat_id: SeatId },

    #[error("transfer needs one destination per source seat ({sources} sources, {destinations} destinations)")]
    SeatPairMismatch { sources: usize, destinations: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("trip {0} not found")]
    TripNotFound(TripId),

    #[error("seat {seat_id} does not exist on trip {trip_id}")]
    SeatNotFound { trip_id: TripId, seat_id: SeatId },

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("booking {booking_id} has no ticket on seat {seat_id} of trip {trip_id}")]
    TicketNotFound {
        booking_id: BookingId,
        trip_id: TripId,
        seat_id: SeatId,
    },

    #[error("cannot swap seats across trips ({from} and {to})")]
    CrossTripSwapNotAllowed { from: TripId, to: TripId },

    #[error("cannot swap seat {0} with itself")]
    SameSeat(SeatId),

    #[error("seat {seat_id} on trip {trip_id} has no ticket to refund")]
    NoTicketToRefund { trip_id: TripId, seat_id: SeatId },

    #[error("seat {seat_id} on trip {trip_id} is already taken")]
    SeatOccupied { trip_id: TripId, seat_id: SeatId },

    #[error("ticket on seat {seat_id} is already paid")]
    TicketAlreadyPaid { seat_id: SeatId },

    #[error("document was modified concurrently, retry the operation")]
    ConcurrentModification,

    #[error("storage error")]
    Storage(#[source] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingTicketDetail { .. }
            | EngineError::DuplicateSeat { .. }
            | EngineError::SeatPairMismatch { .. }
            | EngineError::InvalidRequest(_) => ErrorKind::Validation,
            EngineError::TripNotFound(_)
            | EngineError::SeatNotFound { .. }
            | EngineError::BookingNotFound(_)
            | EngineError::TicketNotFound { .. } => ErrorKind::NotFound,
            EngineError::CrossTripSwapNotAllowed { .. }
            | EngineError::SameSeat(_)
            | EngineError::NoTicketToRefund { .. }
            | EngineError::SeatOccupied { .. }
            | EngineError::TicketAlreadyPaid { .. } => ErrorKind::InvalidOperation,
            EngineError::ConcurrentModification => ErrorKind::Conflict,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidOperation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MissingTicketDetail { .. } => "MISSING_TICKET_DETAIL",
            EngineError::DuplicateSeat { .. } => "DUPLICATE_SEAT",
            EngineError::SeatPairMismatch { .. } => "SEAT_PAIR_MISMATCH",
            EngineError::InvalidRequest(_) => "VALIDATION_ERROR",
            EngineError::TripNotFound(_) => "TRIP_NOT_FOUND",
            EngineError::SeatNotFound { .. } => "SEAT_NOT_FOUND",
            EngineError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            EngineError::TicketNotFound { .. } => "TICKET_NOT_FOUND",
            EngineError::CrossTripSwapNotAllowed { .. } => "CROSS_TRIP_SWAP",
            EngineError::SameSeat(_) => "SAME_SEAT",
            EngineError::NoTicketToRefund { .. } => "NO_TICKET_TO_REFUND",
            EngineError::SeatOccupied { .. } => "SEAT_OCCUPIED",
            EngineError::TicketAlreadyPaid { .. } => "TICKET_ALREADY_PAID",
            EngineError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            EngineError::Storage(source) => {
                error!(error = ?source, "Storage error");
                "A storage error occurred".to_string()
            }
            other => {
                warn!(code = other.code(), "{other}");
                other.to_string()
            }
        };

        (status, Json(json!({ "error": { "code": self.code(), "message": message } }))).into_response()
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { .. } => EngineError::ConcurrentModification,
            other => EngineError::Storage(other),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}
