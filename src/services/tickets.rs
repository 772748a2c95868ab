//! Per-seat edits: contact details on one ticket, and single-seat pay/refund.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::ledger::{incremental_delta, PaidTotals};
use super::seat_map::{apply_ticket_state, ensure_seat, release_seat};
use super::status::is_hold;
use super::BookingEngine;
use crate::error::EngineError;
use crate::models::{AuditAction, AuditEntry, Booking, BookingId, Money, Payment, SeatId, TicketStatus, Trip, TripId};
use crate::store::{Changeset, LedgerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketAction {
    Pay,
    Refund,
}

/// Field-level edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TicketPatch {
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub dropoff: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub exact_bed: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub price: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PatchTicketRequest {
    pub trip_id: TripId,
    pub seat_id: SeatId,
    #[serde(default)]
    #[validate(nested)]
    pub fields: TicketPatch,
    #[serde(default)]
    pub action: Option<TicketAction>,
    /// Amount taken (PAY) or given back (REFUND); both channels non-negative.
    #[serde(default)]
    #[validate(nested)]
    pub payment: Option<PaidTotals>,
}

impl PatchTicketRequest {
    pub fn edit(trip_id: TripId, seat_id: SeatId, fields: TicketPatch) -> Self {
        Self {
            trip_id,
            seat_id,
            fields,
            action: None,
            payment: None,
        }
    }

    pub fn pay(trip_id: TripId, seat_id: SeatId, payment: Option<PaidTotals>) -> Self {
        Self {
            action: Some(TicketAction::Pay),
            payment,
            ..Self::edit(trip_id, seat_id, TicketPatch::default())
        }
    }

    pub fn refund(trip_id: TripId, seat_id: SeatId) -> Self {
        Self {
            action: Some(TicketAction::Refund),
            ..Self::edit(trip_id, seat_id, TicketPatch::default())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub booking: Booking,
    pub trip: Trip,
    pub payment: Option<Payment>,
}

fn describe(action: Option<TicketAction>, seat: &str, amount: Option<Money>) -> (AuditAction, String) {
    match (action, amount) {
        (Some(TicketAction::Pay), Some(amount)) => (AuditAction::TicketPaid, format!("Seat {seat} paid {amount}")),
        (Some(TicketAction::Pay), None) => (AuditAction::TicketPaid, format!("Seat {seat} marked paid")),
        (Some(TicketAction::Refund), Some(amount)) => {
            (AuditAction::TicketRefunded, format!("Seat {seat} refunded {amount}"))
        }
        (Some(TicketAction::Refund), None) => (AuditAction::TicketRefunded, format!("Seat {seat} released")),
        (None, _) => (AuditAction::TicketUpdated, format!("Seat {seat} details updated")),
    }
}

impl<S: LedgerStore> BookingEngine<S> {
    pub async fn patch_ticket(
        &self,
        booking_id: BookingId,
        request: PatchTicketRequest,
    ) -> Result<PatchOutcome, EngineError> {
        request.validate()?;
        let PatchTicketRequest {
            trip_id,
            seat_id,
            fields,
            action,
            payment: amount,
        } = request;

        let mut booking = self.load_booking(booking_id).await?;
        let mut trip = self.load_trip(trip_id).await?;
        ensure_seat(&trip, &seat_id)?;

        let single_seat = booking.ticket_count() == 1;
        let was_hold = is_hold(&booking);
        let mut payment = None;

        match action {
            Some(TicketAction::Refund) => {
                let ticket = booking
                    .item(&trip_id)
                    .and_then(|item| item.ticket(&seat_id))
                    .ok_or(EngineError::NoTicketToRefund { trip_id, seat_id })?;
                let refund = amount.unwrap_or_else(|| {
                    if ticket.status == TicketStatus::Payment {
                        PaidTotals::cash(ticket.price)
                    } else {
                        PaidTotals::default()
                    }
                });

                release_seat(&mut trip, &seat_id)?;
                if !was_hold {
                    payment = incremental_delta(booking_id, refund, -1.0, self.epsilon);
                }
                if let Some(item) = booking.item_mut(&trip_id) {
                    item.tickets.retain(|t| t.seat_id != seat_id);
                }
            }
            action => {
                let item = booking.item_mut(&trip_id).ok_or(EngineError::TicketNotFound {
                    booking_id,
                    trip_id,
                    seat_id,
                })?;
                let ticket = item.ticket_mut(&seat_id).ok_or(EngineError::TicketNotFound {
                    booking_id,
                    trip_id,
                    seat_id,
                })?;

                if fields.pickup.is_some() {
                    ticket.pickup.clone_from(&fields.pickup);
                }
                if fields.dropoff.is_some() {
                    ticket.dropoff.clone_from(&fields.dropoff);
                }
                if fields.note.is_some() {
                    ticket.note.clone_from(&fields.note);
                }
                if fields.name.is_some() {
                    ticket.name.clone_from(&fields.name);
                }
                if fields.phone.is_some() {
                    ticket.phone.clone_from(&fields.phone);
                }
                if let Some(exact) = fields.exact_bed {
                    ticket.exact_bed = exact;
                }
                if let Some(price) = fields.price {
                    ticket.price = price;
                }

                if action == Some(TicketAction::Pay) {
                    if ticket.status == TicketStatus::Payment {
                        return Err(EngineError::TicketAlreadyPaid { seat_id });
                    }
                    let paid = amount.unwrap_or(PaidTotals::cash(ticket.price));
                    ticket.price = paid.total();
                    ticket.status = TicketStatus::Payment;
                    payment = incremental_delta(booking_id, paid, 1.0, self.epsilon);
                }

                let status = ticket.status;
                apply_ticket_state(&mut trip, &seat_id, Some(status))?;
            }
        }

        if single_seat && action != Some(TicketAction::Refund) {
            if let Some(name) = fields.name.as_ref().filter(|n| !n.trim().is_empty()) {
                booking.passenger.name.clone_from(name);
            }
            if fields.phone.is_some() {
                booking.passenger.phone.clone_from(&fields.phone);
            }
            if fields.note.is_some() {
                booking.passenger.note.clone_from(&fields.note);
            }
        }

        booking.recompute_totals();
        booking.touch();

        let label = trip.seat(&seat_id).map_or_else(|| seat_id.to_string(), |s| s.label.clone());
        let (audit_action, description) = describe(action, &label, payment.as_ref().map(Payment::total_amount));
        let mut changes = Changeset::new();
        changes.record(
            AuditEntry::new(
                audit_action,
                description,
                json!({
                    "trip_id": trip_id,
                    "seat_id": seat_id,
                    "fields": fields,
                    "payment": payment,
                    "total_tickets": booking.total_tickets,
                    "total_price": booking.total_price,
                }),
            )
            .for_booking(booking_id),
        );
        if let Some(payment) = payment.clone() {
            changes.append_payment(payment);
        }
        changes.put_booking(booking.clone());
        trip.updated_at = chrono::Utc::now();
        changes.put_trip(trip.clone());

        let mut committed = self.store().commit(changes).await?;
        info!(booking_id = %booking_id, seat_id = %seat_id, action = ?action, "Ticket patched");

        Ok(PatchOutcome {
            booking: committed.booking(&booking_id).cloned().unwrap_or(booking),
            trip: committed.trips.pop().unwrap_or(trip),
            payment,
        })
    }
}
