//! Batch jobs that detect and repair drift between seat maps, bookings and the
//! payment ledger.
//!
//! Both jobs are best-effort passes: they re-read each document right before
//! mutating it, commit one trip (or one booking) at a time, and skip anything
//! that changed underneath them. Running them twice in a row is a no-op.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{error, info, warn};

use super::ledger::{total_paid, within};
use super::seat_map::seat_status_for;
use super::status::is_hold;
use super::BookingEngine;
use crate::error::EngineError;
use crate::models::{
    AuditAction, AuditEntry, Booking, BookingId, Money, Payment, PaymentId, SeatId, SeatStatus, Ticket,
    TicketStatus, TripId,
};
use crate::store::{Changeset, LedgerStore};

/// One ticket on a seat, as seen by the seat-sync job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatClaim {
    pub booking_id: BookingId,
    /// Position of the ticket inside the booking's item for the trip.
    pub ticket_index: usize,
    pub price: Money,
    pub status: TicketStatus,
    pub updated_at: DateTime<Utc>,
}

impl SeatClaim {
    fn from_ticket(booking: &Booking, ticket_index: usize, ticket: &Ticket) -> Self {
        Self {
            booking_id: booking.id,
            ticket_index,
            price: ticket.price,
            status: ticket.status,
            updated_at: booking.updated_at,
        }
    }
}

/// Ranks competing claims so that sorting puts the winner first: higher
/// price, then the more recently updated booking, then the lower booking id,
/// then the earlier ticket within one booking.
pub fn claim_precedence(a: &SeatClaim, b: &SeatClaim) -> Ordering {
    b.price
        .total_cmp(&a.price)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.booking_id.cmp(&b.booking_id))
        .then_with(|| a.ticket_index.cmp(&b.ticket_index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatSyncKind {
    /// Seat showed occupied but no ticket references it.
    Fixed,
    /// Seat status disagreed with the ticket occupying it.
    Sync,
    /// Several tickets claimed the seat; losers were stripped.
    Conflict,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatSyncLog {
    pub kind: SeatSyncKind,
    pub trip_id: TripId,
    pub seat_id: SeatId,
    pub label: String,
    pub from: SeatStatus,
    pub to: SeatStatus,
    pub winner: Option<BookingId>,
    pub losers: Vec<BookingId>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeatSyncReport {
    pub fixed_count: usize,
    pub sync_count: usize,
    pub conflict_count: usize,
    pub logs: Vec<SeatSyncLog>,
}

impl SeatSyncReport {
    fn absorb(&mut self, logs: Vec<SeatSyncLog>) {
        for log in &logs {
            match log.kind {
                SeatSyncKind::Fixed => self.fixed_count += 1,
                SeatSyncKind::Sync => self.sync_count += 1,
                SeatSyncKind::Conflict => self.conflict_count += 1,
            }
        }
        self.logs.extend(logs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupKind {
    Orphan,
    Hold,
    Mismatch,
    /// Priced tickets with no money on the ledger; reported, not a mismatch.
    Unpaid,
    TotalFixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupLog {
    pub kind: CleanupKind,
    pub booking_id: BookingId,
    pub payment_id: Option<PaymentId>,
    /// Deleted amount, signed difference (`paid - actual`) or corrected total.
    pub amount: Money,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PaymentCleanupReport {
    pub deleted_count: usize,
    pub fixed_count: usize,
    pub mismatch_count: usize,
    pub unpaid_count: usize,
    pub logs: Vec<CleanupLog>,
}

fn is_conflict(err: &EngineError) -> bool {
    matches!(err, EngineError::ConcurrentModification)
}

impl<S: LedgerStore> BookingEngine<S> {
    pub async fn reconcile_seats(&self) -> Result<SeatSyncReport, EngineError> {
        info!("🪑 Starting seat reconciliation");
        let mut report = SeatSyncReport::default();

        for trip in self.store().trips().await? {
            match self.reconcile_trip(trip.id).await {
                Ok(logs) => report.absorb(logs),
                Err(err) if is_conflict(&err) => {
                    warn!(trip_id = %trip.id, "Trip changed during seat reconciliation, skipped");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            fixed = report.fixed_count,
            sync = report.sync_count,
            conflicts = report.conflict_count,
            "✅ Seat reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_trip(&self, trip_id: TripId) -> Result<Vec<SeatSyncLog>, EngineError> {
        let Some(mut trip) = self.store().trip(trip_id).await? else {
            return Ok(Vec::new());
        };
        let mut bookings: Vec<Booking> = self
            .store()
            .bookings_on_trip(trip_id)
            .await?
            .into_iter()
            .filter(|b| b.ticket_count() > 0)
            .collect();

        let mut claims: HashMap<SeatId, Vec<SeatClaim>> = HashMap::new();
        for booking in &bookings {
            let Some(item) = booking.item(&trip_id) else { continue };
            for (index, ticket) in item.tickets.iter().enumerate() {
                claims
                    .entry(ticket.seat_id)
                    .or_default()
                    .push(SeatClaim::from_ticket(booking, index, ticket));
            }
        }
        for seat_id in claims.keys().filter(|id| !trip.has_seat(id)) {
            warn!(trip_id = %trip_id, seat_id = %seat_id, "Ticket references a seat missing from the trip");
        }

        let mut logs = Vec::new();
        let mut stripped: HashMap<BookingId, HashSet<usize>> = HashMap::new();

        for seat in &mut trip.seats {
            let winner = match claims.get_mut(&seat.id) {
                Some(list) => {
                    list.sort_by(claim_precedence);
                    list.first().copied()
                }
                None => None,
            };
            let losing: Vec<SeatClaim> = claims
                .get(&seat.id)
                .map(|list| list.iter().skip(1).copied().collect())
                .unwrap_or_default();
            for claim in &losing {
                stripped.entry(claim.booking_id).or_default().insert(claim.ticket_index);
            }
            let losers: Vec<BookingId> = losing.iter().map(|c| c.booking_id).collect();

            let expected = winner.map_or(SeatStatus::Available, |claim| seat_status_for(claim.status));
            let previous = seat.status;
            seat.status = expected;

            let kind = if !losers.is_empty() {
                SeatSyncKind::Conflict
            } else if previous == expected {
                continue;
            } else if winner.is_none() {
                SeatSyncKind::Fixed
            } else {
                SeatSyncKind::Sync
            };

            let message = match kind {
                SeatSyncKind::Conflict => format!(
                    "Seat {} claimed by {} tickets; kept {}, stripped {}",
                    seat.label,
                    losers.len() + 1,
                    winner.map(|w| w.booking_id.to_string()).unwrap_or_default(),
                    losers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                ),
                SeatSyncKind::Fixed => format!("Seat {} released: {previous} with no ticket", seat.label),
                SeatSyncKind::Sync => format!("Seat {} status {previous} -> {expected}", seat.label),
            };
            if kind == SeatSyncKind::Conflict {
                warn!(trip_id = %trip_id, seat_id = %seat.id, losers = losers.len(), "Duplicate seat occupancy resolved");
            }

            logs.push(SeatSyncLog {
                kind,
                trip_id,
                seat_id: seat.id,
                label: seat.label.clone(),
                from: previous,
                to: expected,
                winner: winner.map(|w| w.booking_id),
                losers,
                message,
            });
        }

        if logs.is_empty() {
            return Ok(logs);
        }

        let mut changes = Changeset::new();
        changes.record(AuditEntry::new(
            AuditAction::SeatReconciliation,
            format!("Seat reconciliation corrected {} seat(s) on trip {}", logs.len(), trip.route),
            json!({ "trip_id": trip_id, "logs": logs }),
        ));
        for booking in &mut bookings {
            let Some(indices) = stripped.get(&booking.id) else { continue };
            if let Some(item) = booking.item_mut(&trip_id) {
                let mut index = 0;
                item.tickets.retain(|_| {
                    let keep = !indices.contains(&index);
                    index += 1;
                    keep
                });
            }
            booking.recompute_totals();
            booking.touch();
            changes.put_booking(booking.clone());
        }
        trip.updated_at = Utc::now();
        changes.put_trip(trip);

        self.store().commit(changes).await?;
        Ok(logs)
    }

    pub async fn cleanup_payments(&self) -> Result<PaymentCleanupReport, EngineError> {
        info!("💳 Starting payment cleanup");
        let mut report = PaymentCleanupReport::default();

        let bookings: HashMap<BookingId, Booking> =
            self.store().bookings().await?.into_iter().map(|b| (b.id, b)).collect();
        let payments = self.store().payments().await?;

        let mut removed: HashSet<PaymentId> = HashSet::new();
        for payment in &payments {
            let kind = match bookings.get(&payment.booking_id) {
                None => CleanupKind::Orphan,
                Some(booking) if is_hold(booking) => CleanupKind::Hold,
                Some(_) => continue,
            };
            let message = match kind {
                CleanupKind::Orphan => format!("Deleted orphan payment of {}", payment.total_amount()),
                _ => format!("Deleted payment of {} attached to a hold", payment.total_amount()),
            };
            removed.insert(payment.id);
            report.logs.push(CleanupLog {
                kind,
                booking_id: payment.booking_id,
                payment_id: Some(payment.id),
                amount: payment.total_amount(),
                message,
            });
        }

        if !removed.is_empty() {
            let mut changes = Changeset::new();
            for id in &removed {
                changes.delete_payment(*id);
            }
            changes.record(AuditEntry::new(
                AuditAction::PaymentCleanup,
                format!("Payment cleanup deleted {} ledger entr(ies)", removed.len()),
                json!({ "deleted": report.logs }),
            ));
            self.store().commit(changes).await?;
            report.deleted_count = removed.len();
        }

        let mut ledger: HashMap<BookingId, Vec<&Payment>> = HashMap::new();
        for payment in payments.iter().filter(|p| !removed.contains(&p.id)) {
            ledger.entry(payment.booking_id).or_default().push(payment);
        }

        let mut ordered: Vec<&Booking> = bookings.values().collect();
        ordered.sort_by_key(|b| (b.created_at, b.id));

        for booking in ordered {
            let actual = booking.actual_price();
            let entries = ledger.get(&booking.id).map(Vec::as_slice).unwrap_or_default();
            let has_paid_ticket = booking.tickets().any(|t| t.status == TicketStatus::Payment);

            let unpaid = entries.is_empty() && !has_paid_ticket;
            if booking.ticket_count() > 0 && unpaid && !is_hold(booking) && actual > self.epsilon {
                report.unpaid_count += 1;
                report.logs.push(CleanupLog {
                    kind: CleanupKind::Unpaid,
                    booking_id: booking.id,
                    payment_id: None,
                    amount: -actual,
                    message: format!("Reservation of {actual} has no ledger entries yet; mismatch check skipped"),
                });
            } else if booking.ticket_count() > 0 && !unpaid {
                let paid = total_paid(entries.iter().copied());
                if !within(paid, actual, self.epsilon) {
                    let diff = paid - actual;
                    let direction = if diff > 0.0 { "over" } else { "under" };
                    warn!(booking_id = %booking.id, paid, actual, "Ledger mismatch");
                    report.mismatch_count += 1;
                    report.logs.push(CleanupLog {
                        kind: CleanupKind::Mismatch,
                        booking_id: booking.id,
                        payment_id: None,
                        amount: diff,
                        message: format!("Paid {paid} against ticket total {actual}: {direction} by {}", diff.abs()),
                    });
                }
            }

            let stale_count = usize::try_from(booking.total_tickets).ok() != Some(booking.ticket_count());
            if within(booking.total_price, actual, self.epsilon) && !stale_count {
                continue;
            }
            match self.repair_totals(booking.id).await {
                Ok(Some(log)) => {
                    report.fixed_count += 1;
                    report.logs.push(log);
                }
                Ok(None) => {}
                Err(err) if is_conflict(&err) => {
                    warn!(booking_id = %booking.id, "Booking changed during payment cleanup, skipped");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            deleted = report.deleted_count,
            fixed = report.fixed_count,
            mismatches = report.mismatch_count,
            unpaid = report.unpaid_count,
            "✅ Payment cleanup finished"
        );
        Ok(report)
    }

    /// Refreshes the cached totals of one booking from its tickets.
    async fn repair_totals(&self, booking_id: BookingId) -> Result<Option<CleanupLog>, EngineError> {
        let Some(mut booking) = self.store().booking(booking_id).await? else {
            return Ok(None);
        };
        let stored = booking.total_price;
        let stored_tickets = booking.total_tickets;
        booking.recompute_totals();
        if within(stored, booking.total_price, self.epsilon) && stored_tickets == booking.total_tickets {
            return Ok(None);
        }

        let log = CleanupLog {
            kind: CleanupKind::TotalFixed,
            booking_id,
            payment_id: None,
            amount: booking.total_price,
            message: format!("Corrected cached total {stored} -> {}", booking.total_price),
        };

        let mut changes = Changeset::new();
        changes.record(
            AuditEntry::new(
                AuditAction::PaymentCleanup,
                log.message.clone(),
                json!({
                    "from": stored,
                    "to": booking.total_price,
                    "tickets_from": stored_tickets,
                    "tickets_to": booking.total_tickets,
                }),
            )
            .for_booking(booking_id),
        );
        changes.put_booking(booking);
        self.store().commit(changes).await?;
        Ok(Some(log))
    }

    /// Seat-sync followed by payment cleanup.
    pub async fn run_maintenance(&self) -> Result<(SeatSyncReport, PaymentCleanupReport), EngineError> {
        let seats = self.reconcile_seats().await?;
        let payments = self.cleanup_payments().await?;
        Ok((seats, payments))
    }

    /// Runs [`Self::run_maintenance`] every `interval` until the runtime shuts down.
    pub fn spawn_reconciliation_loop(&self, interval: Duration, run_on_start: bool) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            if !run_on_start {
                tokio::time::sleep(interval).await;
            }
            loop {
                if let Err(err) = engine.run_maintenance().await {
                    error!("Background reconciliation failed: {err}");
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn claim(price: Money, minutes_ago: i64) -> SeatClaim {
        SeatClaim {
            booking_id: BookingId::new(),
            ticket_index: 0,
            price,
            status: TicketStatus::Booking,
            updated_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    #[test]
    fn higher_price_wins() {
        let cheap = claim(100.0, 0);
        let dear = claim(150.0, 60);
        let mut claims = vec![cheap, dear];
        claims.sort_by(claim_precedence);
        assert_eq!(claims[0].booking_id, dear.booking_id);
    }

    #[test]
    fn most_recent_update_breaks_price_ties() {
        let older = claim(100.0, 30);
        let newer = claim(100.0, 5);
        let mut claims = vec![older, newer];
        claims.sort_by(claim_precedence);
        assert_eq!(claims[0].booking_id, newer.booking_id);
    }

    #[test]
    fn earlier_ticket_wins_within_one_booking() {
        let first = claim(120.0, 0);
        let second = SeatClaim { ticket_index: 1, ..first };
        let mut claims = vec![second, first];
        claims.sort_by(claim_precedence);
        assert_eq!(claims[0].ticket_index, 0);
    }

    #[test]
    fn full_tie_is_deterministic() {
        let at = Utc::now();
        let a = SeatClaim { updated_at: at, ..claim(80.0, 0) };
        let b = SeatClaim { updated_at: at, ..claim(80.0, 0) };
        let expected = a.booking_id.min(b.booking_id);

        let mut forward = vec![a, b];
        forward.sort_by(claim_precedence);
        let mut backward = vec![b, a];
        backward.sort_by(claim_precedence);
        assert_eq!(forward[0].booking_id, expected);
        assert_eq!(backward[0].booking_id, expected);
    }
}
