//! Payment ledger arithmetic. The ledger is a list of signed deltas; balances
//! are always folded from it, never stored.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{BookingId, Money, Payment, TransactionType};

/// Money split by channel, either as a running total or as a requested amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PaidTotals {
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub cash: Money,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub transfer: Money,
}

impl PaidTotals {
    pub const fn cash(amount: Money) -> Self {
        Self {
            cash: amount,
            transfer: 0.0,
        }
    }

    pub fn total(&self) -> Money {
        self.cash + self.transfer
    }
}

pub fn paid_totals<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> PaidTotals {
    payments.into_iter().fold(PaidTotals::default(), |acc, p| PaidTotals {
        cash: acc.cash + p.cash_amount,
        transfer: acc.transfer + p.transfer_amount,
    })
}

pub fn total_paid<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Money {
    paid_totals(payments).total()
}

pub fn within(a: Money, b: Money, epsilon: Money) -> bool {
    (a - b).abs() <= epsilon
}

/// Entry that moves the ledger from `old` to `requested` totals, or `None`
/// when nothing changes beyond `epsilon`.
pub fn snapshot_delta(
    booking_id: BookingId,
    old: PaidTotals,
    requested: PaidTotals,
    epsilon: Money,
) -> Option<Payment> {
    let cash = requested.cash - old.cash;
    let transfer = requested.transfer - old.transfer;
    if cash.abs() <= epsilon && transfer.abs() <= epsilon {
        return None;
    }
    Some(Payment::new(booking_id, cash, transfer, TransactionType::Snapshot))
}

/// Single-seat pay (positive) or refund (negative) entry.
pub fn incremental_delta(booking_id: BookingId, amount: PaidTotals, sign: f64, epsilon: Money) -> Option<Payment> {
    if amount.total().abs() <= epsilon {
        return None;
    }
    Some(Payment::new(
        booking_id,
        sign * amount.cash,
        sign * amount.transfer,
        TransactionType::Incremental,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentType;

    #[test]
    fn totals_fold_signed_entries() {
        let id = BookingId::new();
        let ledger = vec![
            Payment::new(id, 300.0, 0.0, TransactionType::Snapshot),
            Payment::new(id, 0.0, 200.0, TransactionType::Snapshot),
            Payment::new(id, -150.0, 0.0, TransactionType::Incremental),
        ];
        assert_eq!(paid_totals(&ledger), PaidTotals { cash: 150.0, transfer: 200.0 });
        assert_eq!(total_paid(&ledger), 350.0);
    }

    #[test]
    fn snapshot_delta_closes_the_gap_to_requested() {
        let id = BookingId::new();
        let old = PaidTotals { cash: 100.0, transfer: 50.0 };
        let requested = PaidTotals { cash: 40.0, transfer: 50.0 };
        let delta = snapshot_delta(id, old, requested, 0.01).unwrap();
        assert_eq!(delta.total_amount(), -60.0);
        assert_eq!(delta.payment_type, PaymentType::Refund);
        assert_eq!(delta.transaction_type, TransactionType::Snapshot);
        assert!(within(old.total() + delta.total_amount(), requested.total(), 0.01));
    }

    #[test]
    fn no_entry_when_nothing_moved() {
        let id = BookingId::new();
        let same = PaidTotals::cash(200.0);
        assert!(snapshot_delta(id, same, same, 0.01).is_none());
        assert!(incremental_delta(id, PaidTotals::default(), -1.0, 0.01).is_none());
    }

    #[test]
    fn refund_entries_are_negative() {
        let refund = incremental_delta(BookingId::new(), PaidTotals::cash(150.0), -1.0, 0.01).unwrap();
        assert_eq!(refund.cash_amount, -150.0);
        assert_eq!(refund.payment_type, PaymentType::Refund);
        assert_eq!(refund.transaction_type, TransactionType::Incremental);
    }
}
