//! Persistence for the three data surfaces: trip seat maps, bookings and the
//! payment ledger (plus the audit trail).
//!
//! Every operation reads the documents it needs, computes the new state in
//! memory and hands the result to [`LedgerStore::commit`] as one
//! [`Changeset`]. A commit is all-or-nothing: either every trip, booking,
//! payment and audit row in it lands, or none does. Trips and bookings carry a
//! `version`; a commit whose documents were modified since they were read is
//! refused with [`StoreError::VersionConflict`].

use std::future::Future;
use thiserror::Error;

use crate::models::{AuditEntry, Booking, BookingId, Payment, PaymentId, Trip, TripId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to decode stored document: {0}")]
    Decode(String),

    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: &'static str, id: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything one logical operation writes.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    pub trips: Vec<Trip>,
    pub bookings: Vec<Booking>,
    pub deleted_bookings: Vec<Booking>,
    pub payments: Vec<Payment>,
    pub deleted_payments: Vec<PaymentId>,
    pub audit: Vec<AuditEntry>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a trip in the set.
    pub fn put_trip(&mut self, trip: Trip) {
        match self.trips.iter_mut().find(|t| t.id == trip.id) {
            Some(slot) => *slot = trip,
            None => self.trips.push(trip),
        }
    }

    pub fn put_booking(&mut self, booking: Booking) {
        match self.bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(slot) => *slot = booking,
            None => self.bookings.push(booking),
        }
    }

    pub fn delete_booking(&mut self, booking: Booking) {
        self.bookings.retain(|b| b.id != booking.id);
        self.deleted_bookings.push(booking);
    }

    pub fn append_payment(&mut self, payment: Payment) {
        self.payments.push(payment);
    }

    pub fn delete_payment(&mut self, id: PaymentId) {
        if !self.deleted_payments.contains(&id) {
            self.deleted_payments.push(id);
        }
    }

    pub fn record(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
            && self.bookings.is_empty()
            && self.deleted_bookings.is_empty()
            && self.payments.is_empty()
            && self.deleted_payments.is_empty()
            && self.audit.is_empty()
    }
}

/// Documents as they were persisted, with their new versions.
#[derive(Debug, Default, Clone)]
pub struct Committed {
    pub trips: Vec<Trip>,
    pub bookings: Vec<Booking>,
    pub payments: Vec<Payment>,
}

impl Committed {
    pub fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| &b.id == id)
    }
}

pub trait LedgerStore: Clone + Send + Sync + 'static {
    fn trip(&self, id: TripId) -> impl Future<Output = StoreResult<Option<Trip>>> + Send;

    fn trips(&self) -> impl Future<Output = StoreResult<Vec<Trip>>> + Send;

    fn booking(&self, id: BookingId) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// All bookings, oldest first.
    fn bookings(&self) -> impl Future<Output = StoreResult<Vec<Booking>>> + Send;

    /// Bookings holding an item for the given trip.
    fn bookings_on_trip(&self, trip_id: TripId) -> impl Future<Output = StoreResult<Vec<Booking>>> + Send;

    fn payments_for(&self, booking_id: BookingId) -> impl Future<Output = StoreResult<Vec<Payment>>> + Send;

    /// Whole ledger in append order.
    fn payments(&self) -> impl Future<Output = StoreResult<Vec<Payment>>> + Send;

    fn audit_log(&self, booking_id: Option<BookingId>) -> impl Future<Output = StoreResult<Vec<AuditEntry>>> + Send;

    fn commit(&self, changes: Changeset) -> impl Future<Output = StoreResult<Committed>> + Send;
}

/// Backend picked at startup from `STORAGE_BACKEND`.
#[derive(Clone)]
pub enum StoreBackend {
    Postgres(PgStore),
    Memory(InMemoryStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Postgres($store) => $call.await,
            StoreBackend::Memory($store) => $call.await,
        }
    };
}

impl LedgerStore for StoreBackend {
    async fn trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        dispatch!(self, s => s.trip(id))
    }

    async fn trips(&self) -> StoreResult<Vec<Trip>> {
        dispatch!(self, s => s.trips())
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        dispatch!(self, s => s.booking(id))
    }

    async fn bookings(&self) -> StoreResult<Vec<Booking>> {
        dispatch!(self, s => s.bookings())
    }

    async fn bookings_on_trip(&self, trip_id: TripId) -> StoreResult<Vec<Booking>> {
        dispatch!(self, s => s.bookings_on_trip(trip_id))
    }

    async fn payments_for(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>> {
        dispatch!(self, s => s.payments_for(booking_id))
    }

    async fn payments(&self) -> StoreResult<Vec<Payment>> {
        dispatch!(self, s => s.payments())
    }

    async fn audit_log(&self, booking_id: Option<BookingId>) -> StoreResult<Vec<AuditEntry>> {
        dispatch!(self, s => s.audit_log(booking_id))
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<Committed> {
        dispatch!(self, s => s.commit(changes))
    }
}
