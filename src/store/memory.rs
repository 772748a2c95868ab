use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Changeset, Committed, LedgerStore, StoreError, StoreResult};
use crate::models::{AuditEntry, Booking, BookingId, Payment, Trip, TripId};

#[derive(Default)]
struct MemoryState {
    trips: HashMap<TripId, Trip>,
    bookings: HashMap<BookingId, Booking>,
    payments: Vec<Payment>,
    audit: Vec<AuditEntry>,
}

/// Process-local store. A single write lock spans the whole commit, so a
/// changeset is applied atomically exactly like a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes documents as-is, bypassing version checks and audit.
    ///
    /// Meant for fixtures: it can deliberately create drift (duplicate seat
    /// claims, stale seat colors, orphaned payments) that regular operations
    /// never produce.
    pub async fn seed(&self, trips: Vec<Trip>, bookings: Vec<Booking>, payments: Vec<Payment>) {
        let mut state = self.state.write().await;
        for trip in trips {
            state.trips.insert(trip.id, trip);
        }
        for booking in bookings {
            state.bookings.insert(booking.id, booking);
        }
        state.payments.extend(payments);
    }
}

fn check_version(entity: &'static str, id: impl ToString, expected: i64, current: Option<i64>) -> StoreResult<()> {
    match current {
        Some(v) if v == expected => Ok(()),
        None if expected == 0 => Ok(()),
        _ => Err(StoreError::VersionConflict {
            entity,
            id: id.to_string(),
        }),
    }
}

impl LedgerStore for InMemoryStore {
    async fn trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        Ok(self.state.read().await.trips.get(&id).cloned())
    }

    async fn trips(&self) -> StoreResult<Vec<Trip>> {
        let state = self.state.read().await;
        let mut trips: Vec<Trip> = state.trips.values().cloned().collect();
        trips.sort_by_key(|t| (t.departure_date, t.created_at));
        Ok(trips)
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn bookings(&self) -> StoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state.bookings.values().cloned().collect();
        bookings.sort_by_key(|b| (b.created_at, b.id));
        Ok(bookings)
    }

    async fn bookings_on_trip(&self, trip_id: TripId) -> StoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.item(&trip_id).is_some())
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.created_at, b.id));
        Ok(bookings)
    }

    async fn payments_for(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn payments(&self) -> StoreResult<Vec<Payment>> {
        Ok(self.state.read().await.payments.clone())
    }

    async fn audit_log(&self, booking_id: Option<BookingId>) -> StoreResult<Vec<AuditEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .filter(|e| booking_id.is_none() || e.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<Committed> {
        if changes.is_empty() {
            return Ok(Committed::default());
        }
        let mut state = self.state.write().await;

        for trip in &changes.trips {
            check_version("trip", trip.id, trip.version, state.trips.get(&trip.id).map(|t| t.version))?;
        }
        for booking in changes.bookings.iter().chain(&changes.deleted_bookings) {
            check_version(
                "booking",
                booking.id,
                booking.version,
                state.bookings.get(&booking.id).map(|b| b.version),
            )?;
        }

        let mut committed = Committed::default();

        for mut trip in changes.trips {
            trip.version += 1;
            state.trips.insert(trip.id, trip.clone());
            committed.trips.push(trip);
        }
        for mut booking in changes.bookings {
            booking.version += 1;
            state.bookings.insert(booking.id, booking.clone());
            committed.bookings.push(booking);
        }
        for booking in &changes.deleted_bookings {
            state.bookings.remove(&booking.id);
        }
        state.payments.retain(|p| !changes.deleted_payments.contains(&p.id));
        state.payments.extend(changes.payments.iter().cloned());
        state.audit.extend(changes.audit);
        committed.payments = changes.payments;

        Ok(committed)
    }
}
