//! Seat map: keeps every seat's status equal to what its ticket implies.
//!
//! The mapping is ticket-status driven only. Price never changes the color of
//! a seat: an unpaid ticket is `booked` whether it is priced at zero or not.

use crate::error::EngineError;
use crate::models::{SeatId, SeatStatus, Ticket, TicketStatus, Trip};

pub const fn seat_status_for(status: TicketStatus) -> SeatStatus {
    match status {
        TicketStatus::Payment => SeatStatus::Sold,
        TicketStatus::Hold => SeatStatus::Held,
        TicketStatus::Booking => SeatStatus::Booked,
    }
}

/// Status a seat must show given the ticket occupying it, if any.
pub fn derive_seat_status(ticket: Option<&Ticket>) -> SeatStatus {
    ticket.map_or(SeatStatus::Available, |t| seat_status_for(t.status))
}

/// Writes the status implied by `ticket_status` onto the seat and returns it.
/// `None` means no ticket references the seat any more.
pub fn apply_ticket_state(
    trip: &mut Trip,
    seat_id: &SeatId,
    ticket_status: Option<TicketStatus>,
) -> Result<SeatStatus, EngineError> {
    let trip_id = trip.id;
    let seat = trip
        .seat_mut(seat_id)
        .ok_or(EngineError::SeatNotFound { trip_id, seat_id: *seat_id })?;
    seat.status = ticket_status.map_or(SeatStatus::Available, seat_status_for);
    Ok(seat.status)
}

pub fn release_seat(trip: &mut Trip, seat_id: &SeatId) -> Result<(), EngineError> {
    apply_ticket_state(trip, seat_id, None).map(|_| ())
}

pub fn ensure_seat(trip: &Trip, seat_id: &SeatId) -> Result<(), EngineError> {
    if trip.has_seat(seat_id) {
        Ok(())
    } else {
        Err(EngineError::SeatNotFound {
            trip_id: trip.id,
            seat_id: *seat_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seat;
    use chrono::NaiveDate;

    fn trip() -> Trip {
        Trip::new(
            "Hanoi - Sapa",
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            "29B-123.45",
            vec![Seat::new(SeatId::grid(1, 1, 1), "A01")],
        )
    }

    #[test]
    fn ticket_status_maps_to_seat_color() {
        assert_eq!(seat_status_for(TicketStatus::Payment), SeatStatus::Sold);
        assert_eq!(seat_status_for(TicketStatus::Hold), SeatStatus::Held);
        assert_eq!(seat_status_for(TicketStatus::Booking), SeatStatus::Booked);
        assert_eq!(derive_seat_status(None), SeatStatus::Available);
    }

    #[test]
    fn booked_does_not_depend_on_price() {
        let free = Ticket::new(SeatId::grid(1, 1, 1), 0.0, TicketStatus::Booking);
        let priced = Ticket::new(SeatId::grid(1, 1, 1), 250.0, TicketStatus::Booking);
        assert_eq!(derive_seat_status(Some(&free)), derive_seat_status(Some(&priced)));
    }

    #[test]
    fn applying_state_to_unknown_seat_fails() {
        let mut trip = trip();
        let err = apply_ticket_state(&mut trip, &SeatId::grid(1, 9, 9), Some(TicketStatus::Hold)).unwrap_err();
        assert!(matches!(err, EngineError::SeatNotFound { .. }));

        let status = apply_ticket_state(&mut trip, &SeatId::grid(1, 1, 1), Some(TicketStatus::Hold)).unwrap();
        assert_eq!(status, SeatStatus::Held);
        release_seat(&mut trip, &SeatId::grid(1, 1, 1)).unwrap();
        assert_eq!(trip.seats[0].status, SeatStatus::Available);
    }
}
