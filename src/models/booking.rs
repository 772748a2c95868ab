use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::{BookingId, Money, SeatId, Trip, TripId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Booking,
    Hold,
    Payment,
}

impl TicketStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Booking => "booking",
            TicketStatus::Hold => "hold",
            TicketStatus::Payment => "payment",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One seat's reservation record. The unit of seat ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub seat_id: SeatId,
    pub price: Money,
    pub status: TicketStatus,
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub dropoff: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Passenger asked for exactly this bed. Annotation only.
    #[serde(default)]
    pub exact_bed: bool,
}

impl Ticket {
    pub fn new(seat_id: SeatId, price: Money, status: TicketStatus) -> Self {
        Self {
            seat_id,
            price,
            status,
            pickup: None,
            dropoff: None,
            note: None,
            name: None,
            phone: None,
            exact_bed: false,
        }
    }
}

/// The part of a booking that belongs to one trip.
///
/// Route, date and plate are copied from the trip at write time for display and
/// audit; `price` caches the sum of the ticket prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItem {
    pub trip_id: TripId,
    pub route: String,
    pub departure_date: NaiveDate,
    pub license_plate: String,
    pub tickets: Vec<Ticket>,
    pub price: Money,
}

impl BookingItem {
    pub fn for_trip(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            route: trip.route.clone(),
            departure_date: trip.departure_date,
            license_plate: trip.license_plate.clone(),
            tickets: Vec::new(),
            price: 0.0,
        }
    }

    pub fn seat_ids(&self) -> impl Iterator<Item = SeatId> + '_ {
        self.tickets.iter().map(|t| t.seat_id)
    }

    pub fn ticket(&self, seat_id: &SeatId) -> Option<&Ticket> {
        self.tickets.iter().find(|t| &t.seat_id == seat_id)
    }

    pub fn ticket_mut(&mut self, seat_id: &SeatId) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| &t.seat_id == seat_id)
    }

    pub fn recompute_price(&mut self) {
        self.price = self.tickets.iter().map(|t| t.price).sum();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Passenger {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Display status of a booking. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Booking,
    Hold,
    Payment,
    Cancelled,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booking => "booking",
            BookingStatus::Hold => "hold",
            BookingStatus::Payment => "payment",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub passenger: Passenger,
    pub items: Vec<BookingItem>,
    pub total_price: Money,
    pub total_tickets: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(passenger: Passenger) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::new(),
            passenger,
            items: Vec::new(),
            total_price: 0.0,
            total_tickets: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self, trip_id: &TripId) -> Option<&BookingItem> {
        self.items.iter().find(|i| &i.trip_id == trip_id)
    }

    pub fn item_mut(&mut self, trip_id: &TripId) -> Option<&mut BookingItem> {
        self.items.iter_mut().find(|i| &i.trip_id == trip_id)
    }

    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> + '_ {
        self.items.iter().flat_map(|i| i.tickets.iter())
    }

    /// Sum of ticket prices computed fresh, ignoring the cached totals.
    pub fn actual_price(&self) -> Money {
        self.tickets().map(|t| t.price).sum()
    }

    pub fn ticket_count(&self) -> usize {
        self.items.iter().map(|i| i.tickets.len()).sum()
    }

    /// Drops empty items and refreshes every cached total.
    pub fn recompute_totals(&mut self) {
        self.items.retain(|i| !i.tickets.is_empty());
        for item in &mut self.items {
            item.recompute_price();
        }
        self.total_price = self.items.iter().map(|i| i.price).sum();
        self.total_tickets = u32::try_from(self.ticket_count()).unwrap_or(u32::MAX);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
