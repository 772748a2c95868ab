pub mod audit;
pub mod booking;
pub mod ids;
pub mod payment;
pub mod seat;
pub mod trip;

pub use audit::{AuditAction, AuditEntry, SeatDiff};
pub use booking::{Booking, BookingItem, BookingStatus, Passenger, Ticket, TicketStatus};
pub use ids::{AuditId, BookingId, PaymentId, TripId};
pub use payment::{Payment, PaymentType, TransactionType, UnknownLedgerTag};
pub use seat::{ParseSeatIdError, Seat, SeatId, SeatStatus};
pub use trip::{BusLayout, FloorPlan, GridGap, LayoutError, Trip, MAX_FLOORS, MAX_SEATS_PER_TRIP};

/// Monetary amount in the fare currency. Negative values are refunds.
pub type Money = f64;
