//! Whole-booking operations: create, full update, delete, plus read views and
//! the operator's manual ledger adjustment.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};
use validator::Validate;

use super::ledger::{paid_totals, snapshot_delta, total_paid, PaidTotals};
use super::seat_map::{apply_ticket_state, ensure_seat, release_seat};
use super::status::derive_booking_status;
use super::{BookingEngine, TripSet};
use crate::error::EngineError;
use crate::models::{
    AuditAction, AuditEntry, Booking, BookingId, BookingItem, BookingStatus, Money, Passenger, Payment,
    SeatDiff, SeatId, Ticket, TicketStatus, TransactionType, Trip, TripId,
};
use crate::store::{Changeset, LedgerStore};

/// Itemized ticket supplied by the caller. Required for every seat when the
/// booking is created or updated straight into `payment`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TicketDraft {
    pub seat_id: SeatId,
    #[validate(range(min = 0.0))]
    pub price: Money,
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub dropoff: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub exact_bed: Option<bool>,
}

impl TicketDraft {
    pub fn new(seat_id: SeatId, price: Money) -> Self {
        Self {
            seat_id,
            price,
            pickup: None,
            dropoff: None,
            note: None,
            name: None,
            phone: None,
            exact_bed: None,
        }
    }

    /// Overlays the draft on an existing ticket; absent fields keep their value.
    fn apply_to(&self, ticket: &mut Ticket) {
        ticket.price = self.price;
        if self.pickup.is_some() {
            ticket.pickup.clone_from(&self.pickup);
        }
        if self.dropoff.is_some() {
            ticket.dropoff.clone_from(&self.dropoff);
        }
        if self.note.is_some() {
            ticket.note.clone_from(&self.note);
        }
        if self.name.is_some() {
            ticket.name.clone_from(&self.name);
        }
        if self.phone.is_some() {
            ticket.phone.clone_from(&self.phone);
        }
        if let Some(exact) = self.exact_bed {
            ticket.exact_bed = exact;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemRequest {
    pub trip_id: TripId,
    /// Seats to hold on the trip. May be omitted when `tickets` lists them.
    #[serde(default)]
    pub seat_ids: Vec<SeatId>,
    #[serde(default)]
    #[validate(nested)]
    pub tickets: Vec<TicketDraft>,
}

impl ItemRequest {
    pub fn seats(trip_id: TripId, seat_ids: Vec<SeatId>) -> Self {
        Self {
            trip_id,
            seat_ids,
            tickets: Vec::new(),
        }
    }

    pub fn priced(trip_id: TripId, tickets: Vec<TicketDraft>) -> Self {
        Self {
            trip_id,
            seat_ids: Vec::new(),
            tickets,
        }
    }
}

/// Body of both create and full update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(nested)]
    pub items: Vec<ItemRequest>,
    #[validate(nested)]
    pub passenger: Passenger,
    /// Requested paid-in totals after the operation.
    #[serde(default)]
    #[validate(nested)]
    pub payment: Option<PaidTotals>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub updated_trips: Vec<Trip>,
    pub payment: Option<Payment>,
    pub diff: Vec<SeatDiff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub trips: Vec<Trip>,
    pub booking: Booking,
    pub deleted_payments: usize,
}

/// Booking as shown to clients: status and paid total are derived on read.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub booking: Booking,
    pub status: BookingStatus,
    pub total_paid: Money,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustmentRequest {
    #[serde(default)]
    pub cash: Money,
    #[serde(default)]
    pub transfer: Money,
    #[validate(length(min = 1, max = 500))]
    pub note: String,
}

/// Builds the ticket list of one item.
///
/// A seat that was already in `previous` reuses that ticket (keeping contact
/// details and price) with the draft, if any, laid over it. New seats without
/// a draft start at price 0.
///
/// An explicit `status` is stamped on every ticket. Without one, reused
/// tickets keep their own status and new ones get `fallback`.
fn build_item(
    trip: &Trip,
    request: &ItemRequest,
    status: Option<TicketStatus>,
    fallback: TicketStatus,
    previous: Option<&BookingItem>,
) -> Result<BookingItem, EngineError> {
    let mut drafts: HashMap<SeatId, &TicketDraft> = HashMap::new();
    for draft in &request.tickets {
        if drafts.insert(draft.seat_id, draft).is_some() {
            return Err(EngineError::DuplicateSeat { seat_id: draft.seat_id });
        }
    }

    let seat_ids: Vec<SeatId> = if request.seat_ids.is_empty() {
        request.tickets.iter().map(|d| d.seat_id).collect()
    } else {
        request.seat_ids.clone()
    };

    if seat_ids.is_empty() {
        return Err(EngineError::InvalidRequest(format!("item for trip {} has no seats", trip.id)));
    }

    let mut seen = HashSet::new();
    for seat_id in &seat_ids {
        if !seen.insert(*seat_id) {
            return Err(EngineError::DuplicateSeat { seat_id: *seat_id });
        }
    }
    if let Some(stray) = drafts.keys().find(|id| !seen.contains(*id)) {
        return Err(EngineError::InvalidRequest(format!(
            "ticket for seat {stray} is not among the requested seats"
        )));
    }

    let mut item = BookingItem::for_trip(trip);
    for seat_id in seat_ids {
        ensure_seat(trip, &seat_id)?;
        let draft = drafts.get(&seat_id);
        if status == Some(TicketStatus::Payment) && draft.is_none() {
            return Err(EngineError::MissingTicketDetail { trip_id: trip.id });
        }

        let mut ticket = match (previous.and_then(|p| p.ticket(&seat_id)), draft) {
            (Some(old), Some(draft)) => {
                let mut ticket = old.clone();
                draft.apply_to(&mut ticket);
                ticket
            }
            (Some(old), None) => old.clone(),
            (None, Some(draft)) => {
                let mut ticket = Ticket::new(seat_id, 0.0, fallback);
                draft.apply_to(&mut ticket);
                ticket
            }
            (None, None) => Ticket::new(seat_id, 0.0, fallback),
        };
        if let Some(status) = status {
            ticket.status = status;
        }
        item.tickets.push(ticket);
    }
    item.recompute_price();
    Ok(item)
}

/// Seat-level diff of one trip between the old and new item.
fn seat_diff(trip_id: TripId, old: Option<&BookingItem>, new: Option<&BookingItem>) -> SeatDiff {
    let old_ids: BTreeSet<SeatId> = old.map(|i| i.seat_ids().collect()).unwrap_or_default();
    let new_ids: BTreeSet<SeatId> = new.map(|i| i.seat_ids().collect()).unwrap_or_default();
    SeatDiff {
        trip_id: Some(trip_id),
        removed: old_ids.difference(&new_ids).copied().collect(),
        added: new_ids.difference(&old_ids).copied().collect(),
        kept: old_ids.intersection(&new_ids).copied().collect(),
    }
}

fn check_distinct_trips(items: &[ItemRequest]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.trip_id) {
            return Err(EngineError::InvalidRequest(format!(
                "trip {} appears in more than one item",
                item.trip_id
            )));
        }
    }
    Ok(())
}

impl<S: LedgerStore> BookingEngine<S> {
    /// Fails when another booking already holds a ticket on any of `seats`.
    pub(crate) async fn ensure_seats_free(
        &self,
        trip_id: TripId,
        seats: &[SeatId],
        owner: BookingId,
    ) -> Result<(), EngineError> {
        for other in self.store().bookings_on_trip(trip_id).await? {
            if other.id == owner {
                continue;
            }
            let Some(item) = other.item(&trip_id) else { continue };
            if let Some(taken) = seats.iter().find(|s| item.ticket(s).is_some()) {
                return Err(EngineError::SeatOccupied {
                    trip_id,
                    seat_id: *taken,
                });
            }
        }
        Ok(())
    }

    pub async fn create_booking(&self, request: BookingRequest) -> Result<BookingOutcome, EngineError> {
        request.validate()?;
        if request.items.is_empty() {
            return Err(EngineError::InvalidRequest("a booking needs at least one item".into()));
        }
        check_distinct_trips(&request.items)?;

        let status = request.status.unwrap_or(TicketStatus::Booking);
        let mut booking = Booking::new(request.passenger.clone());
        let mut trips = TripSet::default();
        let mut diff = Vec::new();

        for item_request in &request.items {
            let mut trip = self.load_trip(item_request.trip_id).await?;
            let item = build_item(&trip, item_request, Some(status), status, None)?;
            let seats: Vec<SeatId> = item.seat_ids().collect();
            self.ensure_seats_free(trip.id, &seats, booking.id).await?;

            for ticket in &item.tickets {
                apply_ticket_state(&mut trip, &ticket.seat_id, Some(ticket.status))?;
            }
            diff.push(seat_diff(trip.id, None, Some(&item)));
            booking.items.push(item);
            trips.insert(trip);
        }
        booking.recompute_totals();

        let payment = if status == TicketStatus::Hold {
            None
        } else {
            let requested = match request.payment {
                Some(totals) => totals,
                None if status == TicketStatus::Payment => PaidTotals::cash(booking.total_price),
                None => PaidTotals::default(),
            };
            snapshot_delta(booking.id, PaidTotals::default(), requested, self.epsilon)
        };

        let mut changes = Changeset::new();
        changes.record(
            AuditEntry::new(
                AuditAction::BookingCreated,
                format!(
                    "Created booking for {} with {} seat(s), total {}",
                    booking.passenger.name, booking.total_tickets, booking.total_price
                ),
                json!({ "status": status, "seats": diff, "payment": payment }),
            )
            .for_booking(booking.id),
        );
        if let Some(payment) = payment.clone() {
            changes.append_payment(payment);
        }
        changes.put_booking(booking.clone());
        trips.stage(&mut changes);

        let committed = self.store().commit(changes).await?;
        info!(
            booking_id = %booking.id,
            tickets = booking.total_tickets,
            total = booking.total_price,
            "Booking created"
        );

        Ok(BookingOutcome {
            booking: committed.booking(&booking.id).cloned().unwrap_or(booking),
            updated_trips: committed.trips,
            payment,
            diff,
        })
    }

    /// Replaces the booking's whole item set.
    ///
    /// All previously held seats are released first, then the new ticket set is
    /// built the same way `create_booking` does and stamped onto the seat maps.
    pub async fn update_booking(
        &self,
        booking_id: BookingId,
        request: BookingRequest,
    ) -> Result<BookingOutcome, EngineError> {
        request.validate()?;
        check_distinct_trips(&request.items)?;

        let mut booking = self.load_booking(booking_id).await?;
        let old_paid = paid_totals(&self.store().payments_for(booking_id).await?);
        let status = request
            .status
            .unwrap_or_else(|| match derive_booking_status(&booking, old_paid.total()) {
                BookingStatus::Payment => TicketStatus::Payment,
                BookingStatus::Hold => TicketStatus::Hold,
                BookingStatus::Booking | BookingStatus::Cancelled => TicketStatus::Booking,
            });
        let old_items = std::mem::take(&mut booking.items);
        let mut trips = TripSet::default();

        for old in &old_items {
            match self.store().trip(old.trip_id).await? {
                Some(trip) => trips.insert(trip),
                None => warn!(booking_id = %booking_id, trip_id = %old.trip_id, "Booking references a missing trip"),
            }
        }
        for item_request in &request.items {
            if !trips.contains(&item_request.trip_id) {
                let trip = self.load_trip(item_request.trip_id).await?;
                trips.insert(trip);
            }
        }

        for old in &old_items {
            let Some(trip) = trips.get_mut(&old.trip_id) else { continue };
            for seat_id in old.seat_ids() {
                if release_seat(trip, &seat_id).is_err() {
                    warn!(trip_id = %old.trip_id, seat_id = %seat_id, "Released seat no longer exists on trip");
                }
            }
        }

        let mut new_items = Vec::with_capacity(request.items.len());
        for item_request in &request.items {
            let previous = old_items.iter().find(|i| i.trip_id == item_request.trip_id);
            let trip = trips
                .get(&item_request.trip_id)
                .ok_or(EngineError::TripNotFound(item_request.trip_id))?;
            let item = build_item(trip, item_request, request.status, status, previous)?;
            let seats: Vec<SeatId> = item.seat_ids().collect();
            self.ensure_seats_free(item.trip_id, &seats, booking_id).await?;
            new_items.push(item);
        }

        for item in &new_items {
            if let Some(trip) = trips.get_mut(&item.trip_id) {
                for ticket in &item.tickets {
                    apply_ticket_state(trip, &ticket.seat_id, Some(ticket.status))?;
                }
            }
        }

        let mut touched: Vec<TripId> = old_items.iter().map(|i| i.trip_id).collect();
        touched.extend(new_items.iter().map(|i| i.trip_id).filter(|id| !old_items.iter().any(|o| &o.trip_id == id)));
        let diff: Vec<SeatDiff> = touched
            .iter()
            .map(|trip_id| {
                seat_diff(
                    *trip_id,
                    old_items.iter().find(|i| &i.trip_id == trip_id),
                    new_items.iter().find(|i| &i.trip_id == trip_id),
                )
            })
            .collect();

        let old_total = booking.total_price;
        booking.items = new_items;
        booking.passenger = request.passenger.clone();
        booking.recompute_totals();
        booking.touch();

        let payment = if status == TicketStatus::Hold {
            None
        } else {
            let requested = match request.payment {
                Some(totals) => totals,
                None if request.status == Some(TicketStatus::Payment) => PaidTotals {
                    cash: booking.total_price - old_paid.transfer,
                    transfer: old_paid.transfer,
                },
                None => old_paid,
            };
            snapshot_delta(booking_id, old_paid, requested, self.epsilon)
        };

        let mut changes = Changeset::new();
        changes.record(
            AuditEntry::new(
                AuditAction::BookingUpdated,
                format!(
                    "Updated booking: {} seat(s), total {} -> {}",
                    booking.total_tickets, old_total, booking.total_price
                ),
                json!({ "status": status, "seats": diff, "payment": payment }),
            )
            .for_booking(booking_id),
        );
        if let Some(payment) = payment.clone() {
            changes.append_payment(payment);
        }
        changes.put_booking(booking.clone());
        trips.stage(&mut changes);

        let committed = self.store().commit(changes).await?;
        info!(
            booking_id = %booking_id,
            tickets = booking.total_tickets,
            total = booking.total_price,
            "Booking updated"
        );

        Ok(BookingOutcome {
            booking: committed.booking(&booking_id).cloned().unwrap_or(booking),
            updated_trips: committed.trips,
            payment,
            diff,
        })
    }

    /// Cancels a booking outright: seats released, ledger rows purged, booking removed.
    pub async fn delete_booking(&self, booking_id: BookingId) -> Result<DeleteOutcome, EngineError> {
        let booking = self.load_booking(booking_id).await?;
        let mut trips = TripSet::default();

        for item in &booking.items {
            let mut trip = match self.store().trip(item.trip_id).await? {
                Some(trip) => trip,
                None => {
                    warn!(booking_id = %booking_id, trip_id = %item.trip_id, "Skipping seats of a missing trip");
                    continue;
                }
            };
            for seat_id in item.seat_ids() {
                if release_seat(&mut trip, &seat_id).is_err() {
                    warn!(trip_id = %trip.id, seat_id = %seat_id, "Released seat no longer exists on trip");
                }
            }
            trips.insert(trip);
        }

        let payments = self.store().payments_for(booking_id).await?;
        let mut changes = Changeset::new();
        for payment in &payments {
            changes.delete_payment(payment.id);
        }
        let released: Vec<SeatDiff> = booking.items.iter().map(|i| seat_diff(i.trip_id, Some(i), None)).collect();
        changes.record(
            AuditEntry::new(
                AuditAction::BookingDeleted,
                format!(
                    "Deleted booking of {}: {} seat(s) released, {} payment(s) removed",
                    booking.passenger.name,
                    booking.ticket_count(),
                    payments.len()
                ),
                json!({ "seats": released, "total_paid": total_paid(&payments) }),
            )
            .for_booking(booking_id),
        );
        changes.delete_booking(booking.clone());
        trips.stage(&mut changes);

        let committed = self.store().commit(changes).await?;
        info!(booking_id = %booking_id, payments = payments.len(), "Booking deleted");

        Ok(DeleteOutcome {
            trips: committed.trips,
            booking,
            deleted_payments: payments.len(),
        })
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<BookingView, EngineError> {
        let booking = self.load_booking(booking_id).await?;
        let payments = self.store().payments_for(booking_id).await?;
        let paid = total_paid(&payments);
        Ok(BookingView {
            status: derive_booking_status(&booking, paid),
            total_paid: paid,
            booking,
            payments,
        })
    }

    /// Appends an operator-approved offsetting entry, the manual fix for a
    /// ledger mismatch reported by payment cleanup.
    pub async fn record_adjustment(
        &self,
        booking_id: BookingId,
        request: AdjustmentRequest,
    ) -> Result<Payment, EngineError> {
        request.validate()?;
        if request.cash.abs() <= self.epsilon && request.transfer.abs() <= self.epsilon {
            return Err(EngineError::InvalidRequest("adjustment amount is zero".into()));
        }
        let booking = self.load_booking(booking_id).await?;

        let payment = Payment::new(booking.id, request.cash, request.transfer, TransactionType::Incremental)
            .with_note(format!("manual adjustment: {}", request.note));

        let mut changes = Changeset::new();
        changes.append_payment(payment.clone());
        changes.record(
            AuditEntry::new(
                AuditAction::PaymentAdjusted,
                format!("Manual ledger adjustment of {}", payment.total_amount()),
                json!({ "payment": payment }),
            )
            .for_booking(booking.id),
        );
        self.store().commit(changes).await?;
        info!(booking_id = %booking_id, amount = payment.total_amount(), "Ledger adjustment recorded");

        Ok(payment)
    }

    pub async fn audit_log(&self, booking_id: Option<BookingId>) -> Result<Vec<AuditEntry>, EngineError> {
        Ok(self.store().audit_log(booking_id).await?)
    }
}
