//! Trip-level operations: provisioning a seat map, renaming seats, and the two
//! operations that move tickets between seats (swap and transfer).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use validator::Validate;

use super::seat_map::{apply_ticket_state, ensure_seat, release_seat};
use super::{BookingEngine, TripSet};
use crate::error::EngineError;
use crate::models::{
    AuditAction, AuditEntry, Booking, BookingId, BookingItem, BusLayout, SeatId, Ticket, Trip, TripId,
};
use crate::store::{Changeset, LedgerStore};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTripRequest {
    #[validate(length(min = 1, max = 200))]
    pub route: String,
    pub departure_date: NaiveDate,
    #[validate(length(min = 1, max = 20))]
    pub license_plate: String,
    pub layout: BusLayout,
}

/// A seat on a particular trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRef {
    pub trip_id: TripId,
    pub seat_id: SeatId,
}

impl SeatRef {
    pub const fn new(trip_id: TripId, seat_id: SeatId) -> Self {
        Self { trip_id, seat_id }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub bookings: Vec<Booking>,
    pub trips: Vec<Trip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_trip_id: TripId,
    pub to_trip_id: TripId,
    /// Source seats; the i-th moves to the i-th destination seat.
    pub from_seat_ids: Vec<SeatId>,
    pub to_seat_ids: Vec<SeatId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub ok: bool,
    pub booking: Booking,
    pub trips: Vec<Trip>,
}

fn item_ticket<'a>(booking: &'a Booking, trip_id: &TripId, seat_id: &SeatId) -> Option<&'a Ticket> {
    booking.item(trip_id).and_then(|item| item.ticket(seat_id))
}

fn ensure_distinct(seats: &[SeatId]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    match seats.iter().find(|s| !seen.insert(**s)) {
        Some(dup) => Err(EngineError::DuplicateSeat { seat_id: *dup }),
        None => Ok(()),
    }
}

impl<S: LedgerStore> BookingEngine<S> {
    pub async fn create_trip(&self, request: CreateTripRequest) -> Result<Trip, EngineError> {
        request.validate()?;
        let seats = request
            .layout
            .build_seats()
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;

        let trip = Trip::new(request.route, request.departure_date, request.license_plate, seats);
        let mut changes = Changeset::new();
        changes.record(AuditEntry::new(
            AuditAction::TripCreated,
            format!("Created trip {} on {} with {} seats", trip.route, trip.departure_date, trip.seats.len()),
            json!({ "trip_id": trip.id, "seats": trip.seats.len() }),
        ));
        changes.put_trip(trip.clone());

        let committed = self.store().commit(changes).await?;
        info!(trip_id = %trip.id, seats = trip.seats.len(), "Trip created");
        Ok(committed.trips.into_iter().next().unwrap_or(trip))
    }

    pub async fn get_trip(&self, trip_id: TripId) -> Result<Trip, EngineError> {
        self.load_trip(trip_id).await
    }

    /// Changes only the display label; the seat id and every ticket stay put.
    pub async fn rename_seat(&self, trip_id: TripId, seat_id: SeatId, label: String) -> Result<Trip, EngineError> {
        let label = label.trim().to_string();
        if label.is_empty() || label.len() > 16 {
            return Err(EngineError::InvalidRequest("seat label must be 1-16 characters".into()));
        }

        let mut trip = self.load_trip(trip_id).await?;
        let seat = trip
            .seat_mut(&seat_id)
            .ok_or(EngineError::SeatNotFound { trip_id, seat_id })?;
        let old_label = std::mem::replace(&mut seat.label, label.clone());

        let mut changes = Changeset::new();
        changes.record(AuditEntry::new(
            AuditAction::SeatRenamed,
            format!("Renamed seat {old_label} to {label}"),
            json!({ "trip_id": trip_id, "seat_id": seat_id, "from": old_label, "to": label }),
        ));
        trip.updated_at = chrono::Utc::now();
        changes.put_trip(trip.clone());

        let committed = self.store().commit(changes).await?;
        Ok(committed.trips.into_iter().next().unwrap_or(trip))
    }

    /// Exchanges the occupants of two seats on the same trip.
    ///
    /// Tickets keep every field but `seat_id`, so swapping twice is a no-op.
    /// Seat statuses are recomputed from the tickets after the move rather than
    /// exchanged, so a stale color on either seat is not carried over.
    pub async fn swap_seats(&self, a: SeatRef, b: SeatRef) -> Result<SwapOutcome, EngineError> {
        if a.trip_id != b.trip_id {
            return Err(EngineError::CrossTripSwapNotAllowed {
                from: a.trip_id,
                to: b.trip_id,
            });
        }
        if a.seat_id == b.seat_id {
            return Err(EngineError::SameSeat(a.seat_id));
        }

        let trip_id = a.trip_id;
        let mut trip = self.load_trip(trip_id).await?;
        ensure_seat(&trip, &a.seat_id)?;
        ensure_seat(&trip, &b.seat_id)?;

        let mut affected: Vec<Booking> = self
            .store()
            .bookings_on_trip(trip_id)
            .await?
            .into_iter()
            .filter(|booking| {
                item_ticket(booking, &trip_id, &a.seat_id).is_some()
                    || item_ticket(booking, &trip_id, &b.seat_id).is_some()
            })
            .collect();

        for booking in &mut affected {
            if let Some(item) = booking.item_mut(&trip_id) {
                for ticket in &mut item.tickets {
                    if ticket.seat_id == a.seat_id {
                        ticket.seat_id = b.seat_id;
                    } else if ticket.seat_id == b.seat_id {
                        ticket.seat_id = a.seat_id;
                    }
                }
            }
            booking.recompute_totals();
            booking.touch();
        }

        for seat_id in [a.seat_id, b.seat_id] {
            let occupant = affected.iter().find_map(|bk| item_ticket(bk, &trip_id, &seat_id));
            apply_ticket_state(&mut trip, &seat_id, occupant.map(|t| t.status))?;
        }

        let mut changes = Changeset::new();
        let holders: Vec<BookingId> = affected.iter().map(|b| b.id).collect();
        let mut entry = AuditEntry::new(
            AuditAction::SeatsSwapped,
            format!("Swapped seats {} and {} on trip {}", a.seat_id, b.seat_id, trip.route),
            json!({
                "trip_id": trip_id,
                "seats": [a.seat_id, b.seat_id],
                "bookings": holders,
                "statuses": [
                    trip.seat(&a.seat_id).map(|s| s.status),
                    trip.seat(&b.seat_id).map(|s| s.status),
                ],
            }),
        );
        if let [only] = holders.as_slice() {
            entry = entry.for_booking(*only);
        }
        changes.record(entry);
        for booking in &affected {
            changes.put_booking(booking.clone());
        }
        trip.updated_at = chrono::Utc::now();
        changes.put_trip(trip);

        let committed = self.store().commit(changes).await?;
        info!(
            trip_id = %trip_id,
            seat_a = %a.seat_id,
            seat_b = %b.seat_id,
            bookings = holders.len(),
            "Seats swapped"
        );

        Ok(SwapOutcome {
            bookings: committed.bookings,
            trips: committed.trips,
        })
    }

    /// Moves tickets of one booking from seats on one trip to seats on another.
    ///
    /// Tickets keep their status and price; destination seats take the status
    /// the moved tickets imply and source seats are released.
    pub async fn transfer_seats(
        &self,
        booking_id: BookingId,
        request: TransferRequest,
    ) -> Result<TransferOutcome, EngineError> {
        if request.from_seat_ids.len() != request.to_seat_ids.len() {
            return Err(EngineError::SeatPairMismatch {
                sources: request.from_seat_ids.len(),
                destinations: request.to_seat_ids.len(),
            });
        }
        if request.from_seat_ids.is_empty() {
            return Err(EngineError::InvalidRequest("no seats to transfer".into()));
        }
        ensure_distinct(&request.from_seat_ids)?;
        ensure_distinct(&request.to_seat_ids)?;

        let (from_id, to_id) = (request.from_trip_id, request.to_trip_id);
        let mut booking = self.load_booking(booking_id).await?;
        let mut trips = TripSet::default();
        trips.insert(self.load_trip(from_id).await?);
        if from_id != to_id {
            trips.insert(self.load_trip(to_id).await?);
        }

        let source = booking.item(&from_id);
        for seat_id in &request.from_seat_ids {
            if source.and_then(|item| item.ticket(seat_id)).is_none() {
                return Err(EngineError::TicketNotFound {
                    booking_id,
                    trip_id: from_id,
                    seat_id: *seat_id,
                });
            }
        }

        let destination = trips.get(&to_id).ok_or(EngineError::TripNotFound(to_id))?;
        for seat_id in &request.to_seat_ids {
            ensure_seat(destination, seat_id)?;
        }
        self.ensure_seats_free(to_id, &request.to_seat_ids, booking_id).await?;
        // Own tickets may only sit on a destination seat if they are moving out of it.
        if let Some(own) = booking.item(&to_id) {
            let vacated = |s: &SeatId| from_id == to_id && request.from_seat_ids.contains(s);
            if let Some(taken) = request.to_seat_ids.iter().find(|s| own.ticket(s).is_some() && !vacated(*s)) {
                return Err(EngineError::SeatOccupied {
                    trip_id: to_id,
                    seat_id: *taken,
                });
            }
        }
        let destination_template = BookingItem::for_trip(destination);

        let mut moved: Vec<Ticket> = Vec::with_capacity(request.from_seat_ids.len());
        if let Some(item) = booking.item_mut(&from_id) {
            for (from_seat, to_seat) in request.from_seat_ids.iter().zip(&request.to_seat_ids) {
                if let Some(pos) = item.tickets.iter().position(|t| &t.seat_id == from_seat) {
                    let mut ticket = item.tickets.remove(pos);
                    ticket.seat_id = *to_seat;
                    moved.push(ticket);
                }
            }
        }

        if let Some(trip) = trips.get_mut(&from_id) {
            for seat_id in &request.from_seat_ids {
                release_seat(trip, seat_id)?;
            }
        }
        if let Some(trip) = trips.get_mut(&to_id) {
            for ticket in &moved {
                apply_ticket_state(trip, &ticket.seat_id, Some(ticket.status))?;
            }
        }

        match booking.item_mut(&to_id) {
            Some(item) => item.tickets.extend(moved),
            None => {
                let mut item = destination_template;
                item.tickets = moved;
                booking.items.push(item);
            }
        }
        booking.recompute_totals();
        booking.touch();

        let mut changes = Changeset::new();
        changes.record(
            AuditEntry::new(
                AuditAction::SeatsTransferred,
                format!(
                    "Transferred {} seat(s) to trip {}",
                    request.from_seat_ids.len(),
                    trips.get(&to_id).map_or("", |t| t.route.as_str())
                ),
                json!({
                    "from_trip_id": from_id,
                    "to_trip_id": to_id,
                    "from": request.from_seat_ids,
                    "to": request.to_seat_ids,
                }),
            )
            .for_booking(booking_id),
        );
        changes.put_booking(booking.clone());
        trips.stage(&mut changes);

        let committed = self.store().commit(changes).await?;
        info!(
            booking_id = %booking_id,
            from_trip = %from_id,
            to_trip = %to_id,
            seats = request.from_seat_ids.len(),
            "Seats transferred"
        );

        Ok(TransferOutcome {
            ok: true,
            booking: committed.booking(&booking_id).cloned().unwrap_or(booking),
            trips: committed.trips,
        })
    }
}
