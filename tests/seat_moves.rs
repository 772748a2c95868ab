//! Swap, transfer and rename: operations that move tickets between seats or
//! change how seats are shown.
//!
//! Run with: `cargo test --test seat_moves`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use common::{assert_totals_consistent, berth, create_trip, engine, passenger, seat_status};
use proptest::prelude::*;
use seat_ledger::error::{EngineError, ErrorKind};
use seat_ledger::models::{Booking, BookingId, BusLayout, FloorPlan, SeatId, SeatStatus, TicketStatus, Trip, TripId};
use seat_ledger::services::seat_map::derive_seat_status;
use seat_ledger::services::{BookingRequest, ItemRequest, SeatRef, TicketDraft, TransferRequest};
use seat_ledger::store::{InMemoryStore, LedgerStore};

async fn book(
    engine: &common::Engine,
    trip_id: TripId,
    tickets: Vec<(SeatId, f64)>,
    status: TicketStatus,
) -> Booking {
    let drafts = tickets.into_iter().map(|(seat, price)| TicketDraft::new(seat, price)).collect();
    engine
        .create_booking(BookingRequest {
            items: vec![ItemRequest::priced(trip_id, drafts)],
            passenger: passenger(),
            payment: None,
            status: Some(status),
        })
        .await
        .expect("booking created")
        .booking
}

async fn reload(store: &InMemoryStore, id: BookingId) -> Booking {
    store.booking(id).await.unwrap().expect("booking exists")
}

async fn trip_of(store: &InMemoryStore, id: TripId) -> Trip {
    common::trip(store, id).await
}

#[tokio::test]
async fn swap_into_an_empty_seat_moves_the_ticket() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;
    let (a1, a2) = (berth(1, 1), berth(1, 2));
    let booking = book(&engine, trip.id, vec![(a1, 100.0)], TicketStatus::Payment).await;

    engine.swap_seats(SeatRef::new(trip.id, a1), SeatRef::new(trip.id, a2)).await.unwrap();

    assert_eq!(seat_status(&store, trip.id, a1).await, SeatStatus::Available);
    assert_eq!(seat_status(&store, trip.id, a2).await, SeatStatus::Sold);
    let after = reload(&store, booking.id).await;
    let ticket = &after.items[0].tickets[0];
    assert_eq!(ticket.seat_id, a2);
    assert_eq!(ticket.price, 100.0);
    assert_eq!(after.total_price, booking.total_price);
    assert_totals_consistent(&after);
}

#[tokio::test]
async fn swap_between_two_bookings_exchanges_occupants() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;
    let (a, b) = (berth(2, 1), berth(2, 2));
    let paid = book(&engine, trip.id, vec![(a, 180.0)], TicketStatus::Payment).await;
    let held = book(&engine, trip.id, vec![(b, 90.0)], TicketStatus::Hold).await;

    let outcome = engine.swap_seats(SeatRef::new(trip.id, a), SeatRef::new(trip.id, b)).await.unwrap();
    assert_eq!(outcome.bookings.len(), 2);

    assert_eq!(reload(&store, paid.id).await.items[0].tickets[0].seat_id, b);
    assert_eq!(reload(&store, held.id).await.items[0].tickets[0].seat_id, a);
    assert_eq!(seat_status(&store, trip.id, a).await, SeatStatus::Held);
    assert_eq!(seat_status(&store, trip.id, b).await, SeatStatus::Sold);
}

#[tokio::test]
async fn swap_recomputes_stale_seat_colors() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;
    let (a, b) = (berth(3, 1), berth(3, 2));
    book(&engine, trip.id, vec![(a, 50.0)], TicketStatus::Booking).await;

    // Seat b shows sold although nobody holds it.
    let mut drifted = trip_of(&store, trip.id).await;
    drifted.seat_mut(&b).unwrap().status = SeatStatus::Sold;
    store.seed(vec![drifted], Vec::new(), Vec::new()).await;

    engine.swap_seats(SeatRef::new(trip.id, a), SeatRef::new(trip.id, b)).await.unwrap();
    assert_eq!(seat_status(&store, trip.id, a).await, SeatStatus::Available);
    assert_eq!(seat_status(&store, trip.id, b).await, SeatStatus::Booked);
}

#[tokio::test]
async fn cross_trip_swap_is_rejected() {
    let (engine, _store) = engine();
    let first = create_trip(&engine, "Hanoi - Sapa").await;
    let second = create_trip(&engine, "Sapa - Hanoi").await;

    let err = engine
        .swap_seats(SeatRef::new(first.id, berth(1, 1)), SeatRef::new(second.id, berth(1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CrossTripSwapNotAllowed { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[tokio::test]
async fn swap_with_a_missing_seat_is_not_found() {
    let (engine, _store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;

    let err = engine
        .swap_seats(SeatRef::new(trip.id, berth(1, 1)), SeatRef::new(trip.id, berth(8, 8)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SeatNotFound { .. }));

    let same = engine
        .swap_seats(SeatRef::new(trip.id, berth(1, 1)), SeatRef::new(trip.id, berth(1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(same, EngineError::SameSeat(_)));
}

#[tokio::test]
async fn transfer_moves_tickets_to_another_trip_in_order() {
    let (engine, store) = engine();
    let outbound = create_trip(&engine, "Hanoi - Sapa").await;
    let later = create_trip(&engine, "Hanoi - Sapa (late)").await;
    let booking = book(
        &engine,
        outbound.id,
        vec![(berth(1, 1), 120.0), (berth(1, 2), 80.0)],
        TicketStatus::Payment,
    )
    .await;

    let outcome = engine
        .transfer_seats(
            booking.id,
            TransferRequest {
                from_trip_id: outbound.id,
                to_trip_id: later.id,
                from_seat_ids: vec![berth(1, 1), berth(1, 2)],
                to_seat_ids: vec![berth(3, 2), berth(3, 1)],
            },
        )
        .await
        .unwrap();

    assert!(outcome.ok);
    let moved = &outcome.booking;
    assert_eq!(moved.items.len(), 1, "empty source item is dropped");
    let item = moved.item(&later.id).unwrap();
    assert_eq!(item.ticket(&berth(3, 2)).unwrap().price, 120.0);
    assert_eq!(item.ticket(&berth(3, 1)).unwrap().price, 80.0);
    assert_eq!(moved.total_price, 200.0);
    assert_totals_consistent(moved);

    assert_eq!(seat_status(&store, outbound.id, berth(1, 1)).await, SeatStatus::Available);
    assert_eq!(seat_status(&store, outbound.id, berth(1, 2)).await, SeatStatus::Available);
    assert_eq!(seat_status(&store, later.id, berth(3, 1)).await, SeatStatus::Sold);
    assert_eq!(seat_status(&store, later.id, berth(3, 2)).await, SeatStatus::Sold);
}

#[tokio::test]
async fn transfer_within_a_trip_may_rotate_own_seats() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hue - Da Nang").await;
    let booking = book(
        &engine,
        trip.id,
        vec![(berth(1, 1), 10.0), (berth(1, 2), 20.0)],
        TicketStatus::Booking,
    )
    .await;

    let outcome = engine
        .transfer_seats(
            booking.id,
            TransferRequest {
                from_trip_id: trip.id,
                to_trip_id: trip.id,
                from_seat_ids: vec![berth(1, 1), berth(1, 2)],
                to_seat_ids: vec![berth(1, 2), berth(2, 1)],
            },
        )
        .await
        .unwrap();

    let item = outcome.booking.item(&trip.id).unwrap();
    assert_eq!(item.ticket(&berth(1, 2)).unwrap().price, 10.0);
    assert_eq!(item.ticket(&berth(2, 1)).unwrap().price, 20.0);
    assert_eq!(seat_status(&store, trip.id, berth(1, 1)).await, SeatStatus::Available);
    assert_eq!(seat_status(&store, trip.id, berth(1, 2)).await, SeatStatus::Booked);
    assert_eq!(seat_status(&store, trip.id, berth(2, 1)).await, SeatStatus::Booked);
}

#[tokio::test]
async fn transfer_rejects_bad_requests_without_writing() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;
    let other = create_trip(&engine, "Sapa - Hanoi").await;
    let mine = book(&engine, trip.id, vec![(berth(1, 1), 100.0)], TicketStatus::Booking).await;
    book(&engine, other.id, vec![(berth(2, 2), 100.0)], TicketStatus::Booking).await;

    let mismatch = TransferRequest {
        from_trip_id: trip.id,
        to_trip_id: other.id,
        from_seat_ids: vec![berth(1, 1)],
        to_seat_ids: vec![berth(2, 1), berth(2, 2)],
    };
    assert!(matches!(
        engine.transfer_seats(mine.id, mismatch).await.unwrap_err(),
        EngineError::SeatPairMismatch { sources: 1, destinations: 2 }
    ));

    let taken = TransferRequest {
        from_trip_id: trip.id,
        to_trip_id: other.id,
        from_seat_ids: vec![berth(1, 1)],
        to_seat_ids: vec![berth(2, 2)],
    };
    assert!(matches!(
        engine.transfer_seats(mine.id, taken).await.unwrap_err(),
        EngineError::SeatOccupied { .. }
    ));

    let not_mine = TransferRequest {
        from_trip_id: trip.id,
        to_trip_id: other.id,
        from_seat_ids: vec![berth(3, 1)],
        to_seat_ids: vec![berth(3, 1)],
    };
    assert!(matches!(
        engine.transfer_seats(mine.id, not_mine).await.unwrap_err(),
        EngineError::TicketNotFound { .. }
    ));

    let missing_seat = TransferRequest {
        from_trip_id: trip.id,
        to_trip_id: other.id,
        from_seat_ids: vec![berth(1, 1)],
        to_seat_ids: vec![berth(7, 7)],
    };
    assert!(matches!(
        engine.transfer_seats(mine.id, missing_seat).await.unwrap_err(),
        EngineError::SeatNotFound { .. }
    ));

    assert_eq!(reload(&store, mine.id).await.items[0].trip_id, trip.id);
    assert_eq!(seat_status(&store, trip.id, berth(1, 1)).await, SeatStatus::Booked);
}

#[tokio::test]
async fn rename_changes_label_only() {
    let (engine, store) = engine();
    let trip = create_trip(&engine, "Hanoi - Sapa").await;
    book(&engine, trip.id, vec![(berth(1, 1), 60.0)], TicketStatus::Booking).await;

    let renamed = engine.rename_seat(trip.id, berth(1, 1), "VIP-1".to_string()).await.unwrap();
    let seat = renamed.seat(&berth(1, 1)).unwrap();
    assert_eq!(seat.label, "VIP-1");
    assert_eq!(seat.status, SeatStatus::Booked);
    assert_eq!(seat_status(&store, trip.id, berth(1, 1)).await, SeatStatus::Booked);

    let err = engine.rename_seat(trip.id, berth(1, 1), "   ".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn oversized_layouts_are_rejected_without_a_trip() {
    let (engine, store) = engine();
    let single = FloorPlan {
        rows: 1,
        cols: 1,
        gaps: Vec::new(),
        benches: Vec::new(),
        floor_slots: 0,
    };

    let mut too_many_floors = common::trip_request("Hanoi - Ha Long");
    too_many_floors.layout = BusLayout {
        floors: vec![single.clone(); 257],
    };
    let err = engine.create_trip(too_many_floors).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut huge_grid = common::trip_request("Hanoi - Ha Long");
    huge_grid.layout = BusLayout {
        floors: vec![FloorPlan {
            rows: 40_000,
            cols: 40_000,
            ..single
        }],
    };
    let err = engine.create_trip(huge_grid).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    assert!(store.trips().await.unwrap().is_empty());
}

fn lower_deck() -> Vec<SeatId> {
    (1..=3).flat_map(|row| (1..=2).map(move |col| berth(row, col))).collect()
}

fn status_strategy() -> impl Strategy<Value = TicketStatus> {
    prop_oneof![
        Just(TicketStatus::Booking),
        Just(TicketStatus::Hold),
        Just(TicketStatus::Payment),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn swapping_twice_restores_every_ticket(
        first in 0usize..6,
        offset in 1usize..6,
        occupants in proptest::collection::vec(
            proptest::option::of((status_strategy(), 0u32..500)),
            6,
        ),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (engine, store) = engine();
            let trip = create_trip(&engine, "Hanoi - Sapa").await;
            let seats = lower_deck();

            let mut bookings = Vec::new();
            for (seat, occupant) in seats.iter().zip(&occupants) {
                if let Some((status, price)) = occupant {
                    let booking = book(&engine, trip.id, vec![(*seat, f64::from(*price))], *status).await;
                    bookings.push(booking.id);
                }
            }

            let a = SeatRef::new(trip.id, seats[first]);
            let b = SeatRef::new(trip.id, seats[(first + offset) % 6]);
            let before: Vec<Booking> = futures::future::join_all(bookings.iter().map(|id| reload(&store, *id))).await;

            engine.swap_seats(a, b).await.unwrap();
            engine.swap_seats(a, b).await.unwrap();

            let trip_after = trip_of(&store, trip.id).await;
            for old in &before {
                let now = reload(&store, old.id).await;
                prop_assert_eq!(&now.items[0].tickets, &old.items[0].tickets);
                assert_totals_consistent(&now);
                let ticket = &now.items[0].tickets[0];
                prop_assert_eq!(
                    trip_after.seat(&ticket.seat_id).unwrap().status,
                    derive_seat_status(Some(ticket))
                );
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
