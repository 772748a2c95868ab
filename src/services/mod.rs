//! Booking engine: the mutating operations that keep seat maps, tickets and
//! the payment ledger consistent, plus the reconciliation jobs that repair
//! drift between them.
//!
//! Each operation is one bounded read-modify-write cycle: load the documents,
//! compute the new state in memory, commit a single [`Changeset`]. Nothing is
//! written if validation fails.

pub mod booking;
pub mod ledger;
pub mod reconciliation;
pub mod seat_map;
pub mod seats;
pub mod status;
pub mod tickets;

use crate::config::LedgerConfig;
use crate::error::EngineError;
use crate::models::{Booking, BookingId, Money, Trip, TripId};
use crate::store::{Changeset, LedgerStore};

pub use booking::{AdjustmentRequest, BookingOutcome, BookingRequest, BookingView, DeleteOutcome, ItemRequest, TicketDraft};
pub use ledger::PaidTotals;
pub use reconciliation::{
    claim_precedence, CleanupKind, CleanupLog, PaymentCleanupReport, SeatClaim, SeatSyncKind, SeatSyncLog,
    SeatSyncReport,
};
pub use seats::{CreateTripRequest, SeatRef, SwapOutcome, TransferOutcome, TransferRequest};
pub use tickets::{PatchOutcome, PatchTicketRequest, TicketAction, TicketPatch};

#[derive(Clone)]
pub struct BookingEngine<S> {
    store: S,
    epsilon: Money,
}

impl<S: LedgerStore> BookingEngine<S> {
    pub fn new(store: S, config: &LedgerConfig) -> Self {
        Self {
            store,
            epsilon: config.mismatch_epsilon,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load_trip(&self, id: TripId) -> Result<Trip, EngineError> {
        self.store.trip(id).await?.ok_or(EngineError::TripNotFound(id))
    }

    async fn load_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.store.booking(id).await?.ok_or(EngineError::BookingNotFound(id))
    }
}

/// Trips touched by one operation, each loaded once and mutated in place.
#[derive(Debug, Default)]
struct TripSet {
    trips: Vec<Trip>,
}

impl TripSet {
    fn contains(&self, id: &TripId) -> bool {
        self.trips.iter().any(|t| &t.id == id)
    }

    fn get(&self, id: &TripId) -> Option<&Trip> {
        self.trips.iter().find(|t| &t.id == id)
    }

    fn get_mut(&mut self, id: &TripId) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|t| &t.id == id)
    }

    fn insert(&mut self, trip: Trip) {
        if !self.contains(&trip.id) {
            self.trips.push(trip);
        }
    }

    fn stage(self, changes: &mut Changeset) {
        for mut trip in self.trips {
            trip.updated_at = chrono::Utc::now();
            changes.put_trip(trip);
        }
    }
}
