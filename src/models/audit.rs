use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuditId, BookingId, SeatId, TripId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TripCreated,
    SeatRenamed,
    BookingCreated,
    BookingUpdated,
    BookingDeleted,
    SeatsSwapped,
    SeatsTransferred,
    TicketUpdated,
    TicketPaid,
    TicketRefunded,
    PaymentAdjusted,
    SeatReconciliation,
    PaymentCleanup,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TripCreated => "trip_created",
            AuditAction::SeatRenamed => "seat_renamed",
            AuditAction::BookingCreated => "booking_created",
            AuditAction::BookingUpdated => "booking_updated",
            AuditAction::BookingDeleted => "booking_deleted",
            AuditAction::SeatsSwapped => "seats_swapped",
            AuditAction::SeatsTransferred => "seats_transferred",
            AuditAction::TicketUpdated => "ticket_updated",
            AuditAction::TicketPaid => "ticket_paid",
            AuditAction::TicketRefunded => "ticket_refunded",
            AuditAction::PaymentAdjusted => "payment_adjusted",
            AuditAction::SeatReconciliation => "seat_reconciliation",
            AuditAction::PaymentCleanup => "payment_cleanup",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = super::UnknownLedgerTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            AuditAction::TripCreated,
            AuditAction::SeatRenamed,
            AuditAction::BookingCreated,
            AuditAction::BookingUpdated,
            AuditAction::BookingDeleted,
            AuditAction::SeatsSwapped,
            AuditAction::SeatsTransferred,
            AuditAction::TicketUpdated,
            AuditAction::TicketPaid,
            AuditAction::TicketRefunded,
            AuditAction::PaymentAdjusted,
            AuditAction::SeatReconciliation,
            AuditAction::PaymentCleanup,
        ];
        all.into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| super::UnknownLedgerTag(s.to_string()))
    }
}

/// Seats that left, joined or stayed in a booking's item for one trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatDiff {
    pub trip_id: Option<TripId>,
    pub removed: Vec<SeatId>,
    pub added: Vec<SeatId>,
    pub kept: Vec<SeatId>,
}

/// One history row per state change, consumed by the history viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub booking_id: Option<BookingId>,
    pub action: AuditAction,
    pub description: String,
    pub diff: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, description: impl Into<String>, diff: serde_json::Value) -> Self {
        Self {
            id: AuditId::new(),
            booking_id: None,
            action,
            description: description.into(),
            diff,
            created_at: Utc::now(),
        }
    }

    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }
}
