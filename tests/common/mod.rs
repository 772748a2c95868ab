//! Shared fixtures: an engine over the in-memory store, a small sleeper-bus
//! layout and generated passengers.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use chrono::NaiveDate;
use fake::faker::name::en::Name;
use fake::Fake;

use seat_ledger::config::LedgerConfig;
use seat_ledger::models::{Booking, BusLayout, FloorPlan, Passenger, SeatId, SeatStatus, Trip, TripId};
use seat_ledger::services::{BookingEngine, CreateTripRequest};
use seat_ledger::store::{InMemoryStore, LedgerStore};

pub type Engine = BookingEngine<InMemoryStore>;

pub fn engine() -> (Engine, InMemoryStore) {
    let store = InMemoryStore::new();
    (BookingEngine::new(store.clone(), &LedgerConfig::default()), store)
}

/// Two decks of 3x2 berths, plus a bench of 3 on the lower deck.
pub fn sleeper_layout() -> BusLayout {
    BusLayout {
        floors: vec![
            FloorPlan {
                rows: 3,
                cols: 2,
                gaps: Vec::new(),
                benches: vec![3],
                floor_slots: 0,
            },
            FloorPlan {
                rows: 3,
                cols: 2,
                gaps: Vec::new(),
                benches: Vec::new(),
                floor_slots: 2,
            },
        ],
    }
}

pub fn trip_request(route: &str) -> CreateTripRequest {
    CreateTripRequest {
        route: route.to_string(),
        departure_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        license_plate: "29B-123.45".to_string(),
        layout: sleeper_layout(),
    }
}

pub async fn create_trip(engine: &Engine, route: &str) -> Trip {
    engine.create_trip(trip_request(route)).await.expect("trip created")
}

/// Lower-deck berth.
pub fn berth(row: u16, col: u16) -> SeatId {
    SeatId::grid(1, row, col)
}

pub fn passenger() -> Passenger {
    let digits: u32 = (10_000_000..99_999_999).fake();
    Passenger {
        name: Name().fake(),
        phone: Some(format!("09{digits}")),
        email: None,
        note: None,
    }
}

pub async fn trip(store: &InMemoryStore, id: TripId) -> Trip {
    store.trip(id).await.unwrap().expect("trip exists")
}

pub async fn seat_status(store: &InMemoryStore, trip_id: TripId, seat_id: SeatId) -> SeatStatus {
    trip(store, trip_id).await.seat(&seat_id).expect("seat exists").status
}

/// Cached totals agree with the tickets.
pub fn assert_totals_consistent(booking: &Booking) {
    let count: usize = booking.items.iter().map(|i| i.tickets.len()).sum();
    assert_eq!(booking.total_tickets as usize, count);
    let item_sum: f64 = booking.items.iter().map(|i| i.price).sum();
    assert!((booking.total_price - item_sum).abs() < 1e-9);
    assert!((booking.total_price - booking.actual_price()).abs() < 1e-9);
    assert!(booking.items.iter().all(|i| !i.tickets.is_empty()));
}
