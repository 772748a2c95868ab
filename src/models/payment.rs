use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{BookingId, Money, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Payment,
    Refund,
}

/// How the delta was computed: whole-booking totals or a single seat action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Snapshot,
    Incremental,
}

impl PaymentType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Payment => "payment",
            PaymentType::Refund => "refund",
        }
    }
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Snapshot => "snapshot",
            TransactionType::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ledger tag `{0}`")]
pub struct UnknownLedgerTag(pub String);

impl FromStr for PaymentType {
    type Err = UnknownLedgerTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(PaymentType::Payment),
            "refund" => Ok(PaymentType::Refund),
            other => Err(UnknownLedgerTag(other.to_string())),
        }
    }
}

impl FromStr for TransactionType {
    type Err = UnknownLedgerTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot" => Ok(TransactionType::Snapshot),
            "incremental" => Ok(TransactionType::Incremental),
            other => Err(UnknownLedgerTag(other.to_string())),
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed monetary delta in the append-only payment ledger.
///
/// Negative amounts are refunds. History is never edited; a wrong entry is
/// corrected by appending an offsetting one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub cash_amount: Money,
    pub transfer_amount: Money,
    pub payment_type: PaymentType,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        booking_id: BookingId,
        cash_amount: Money,
        transfer_amount: Money,
        transaction_type: TransactionType,
    ) -> Self {
        let payment_type = if cash_amount + transfer_amount < 0.0 {
            PaymentType::Refund
        } else {
            PaymentType::Payment
        };
        Self {
            id: PaymentId::new(),
            booking_id,
            cash_amount,
            transfer_amount,
            payment_type,
            transaction_type,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn total_amount(&self) -> Money {
        self.cash_amount + self.transfer_amount
    }
}
