use crate::models::{Booking, BookingStatus, Money, TicketStatus};

/// Display status of a booking, recomputed on every read.
pub fn derive_booking_status(booking: &Booking, total_paid: Money) -> BookingStatus {
    if booking.ticket_count() == 0 {
        BookingStatus::Cancelled
    } else if total_paid > 0.0 {
        BookingStatus::Payment
    } else if booking.tickets().any(|t| t.status == TicketStatus::Hold) {
        BookingStatus::Hold
    } else {
        BookingStatus::Booking
    }
}

/// Status as the tickets alone describe it, without looking at the ledger.
pub fn ticket_level_status(booking: &Booking) -> BookingStatus {
    if booking.ticket_count() == 0 {
        BookingStatus::Cancelled
    } else if booking.tickets().any(|t| t.status == TicketStatus::Payment) {
        BookingStatus::Payment
    } else if booking.tickets().any(|t| t.status == TicketStatus::Hold) {
        BookingStatus::Hold
    } else {
        BookingStatus::Booking
    }
}

/// A hold reserves seats without money; such bookings must not carry ledger rows.
pub fn is_hold(booking: &Booking) -> bool {
    ticket_level_status(booking) == BookingStatus::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Passenger, SeatId, Ticket, TripId};
    use chrono::NaiveDate;

    fn booking_with(statuses: &[TicketStatus]) -> Booking {
        let mut booking = Booking::new(Passenger::default());
        booking.items.push(crate::models::BookingItem {
            trip_id: TripId::new(),
            route: "Da Lat - Nha Trang".into(),
            departure_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            license_plate: "49B-000.01".into(),
            tickets: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| Ticket::new(SeatId::grid(1, 1, i as u16 + 1), 100.0, *s))
                .collect(),
            price: 0.0,
        });
        booking.recompute_totals();
        booking
    }

    #[test]
    fn empty_booking_is_cancelled_even_with_money() {
        let booking = booking_with(&[]);
        assert_eq!(derive_booking_status(&booking, 500.0), BookingStatus::Cancelled);
    }

    #[test]
    fn paid_money_wins_over_hold() {
        let booking = booking_with(&[TicketStatus::Hold]);
        assert_eq!(derive_booking_status(&booking, 10.0), BookingStatus::Payment);
        assert_eq!(derive_booking_status(&booking, 0.0), BookingStatus::Hold);
    }

    #[test]
    fn unpaid_plain_tickets_are_booking() {
        let booking = booking_with(&[TicketStatus::Booking, TicketStatus::Payment]);
        assert_eq!(derive_booking_status(&booking, 0.0), BookingStatus::Booking);
        assert_eq!(ticket_level_status(&booking), BookingStatus::Payment);
    }

    #[test]
    fn hold_detection_ignores_ledger() {
        assert!(is_hold(&booking_with(&[TicketStatus::Hold, TicketStatus::Booking])));
        assert!(!is_hold(&booking_with(&[TicketStatus::Hold, TicketStatus::Payment])));
        assert!(!is_hold(&booking_with(&[])));
    }
}
