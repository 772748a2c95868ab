use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Changeset, Committed, LedgerStore, StoreError, StoreResult};
use crate::models::{
    AuditEntry, Booking, BookingId, BookingItem, Passenger, Payment, Seat, Trip, TripId,
};

/// Postgres-backed store. Seat maps and booking items live in JSONB columns
/// so each trip and booking is a single row; a commit is one SQL transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct TripRow {
    id: Uuid,
    route: String,
    departure_date: NaiveDate,
    license_plate: String,
    seats: Json<Vec<Seat>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Trip {
            id: TripId::from_uuid(row.id),
            route: row.route,
            departure_date: row.departure_date,
            license_plate: row.license_plate,
            seats: row.seats.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    passenger: Json<Passenger>,
    items: Json<Vec<BookingItem>>,
    total_price: f64,
    total_tickets: i32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: BookingId::from_uuid(row.id),
            passenger: row.passenger.0,
            items: row.items.0,
            total_price: row.total_price,
            total_tickets: u32::try_from(row.total_tickets).unwrap_or_default(),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    cash_amount: f64,
    transfer_amount: f64,
    payment_type: String,
    transaction_type: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id.into(),
            booking_id: row.booking_id.into(),
            cash_amount: row.cash_amount,
            transfer_amount: row.transfer_amount,
            payment_type: row
                .payment_type
                .parse()
                .map_err(|e: crate::models::UnknownLedgerTag| StoreError::Decode(e.to_string()))?,
            transaction_type: row
                .transaction_type
                .parse()
                .map_err(|e: crate::models::UnknownLedgerTag| StoreError::Decode(e.to_string()))?,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    booking_id: Option<Uuid>,
    action: String,
    description: String,
    diff: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id.into(),
            booking_id: row.booking_id.map(BookingId::from_uuid),
            action: row
                .action
                .parse()
                .map_err(|e: crate::models::UnknownLedgerTag| StoreError::Decode(e.to_string()))?,
            description: row.description,
            diff: row.diff,
            created_at: row.created_at,
        })
    }
}

const TRIP_COLUMNS: &str =
    "id, route, departure_date, license_plate, seats, version, created_at, updated_at";
const BOOKING_COLUMNS: &str =
    "id, passenger, items, total_price, total_tickets, version, created_at, updated_at";
const PAYMENT_COLUMNS: &str =
    "id, booking_id, cash_amount, transfer_amount, payment_type, transaction_type, note, created_at";

fn conflict(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::VersionConflict {
        entity,
        id: id.to_string(),
    }
}

async fn write_trip(tx: &mut Transaction<'_, Postgres>, trip: &Trip) -> StoreResult<u64> {
    let result = if trip.version == 0 {
        sqlx::query(
            "INSERT INTO trips (id, route, departure_date, license_plate, seats, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(trip.id.as_uuid())
        .bind(&trip.route)
        .bind(trip.departure_date)
        .bind(&trip.license_plate)
        .bind(Json(&trip.seats))
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            "UPDATE trips
             SET route = $2, departure_date = $3, license_plate = $4, seats = $5,
                 version = version + 1, updated_at = $6
             WHERE id = $1 AND version = $7",
        )
        .bind(trip.id.as_uuid())
        .bind(&trip.route)
        .bind(trip.departure_date)
        .bind(&trip.license_plate)
        .bind(Json(&trip.seats))
        .bind(trip.updated_at)
        .bind(trip.version)
        .execute(&mut **tx)
        .await?
    };
    Ok(result.rows_affected())
}

async fn write_booking(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> StoreResult<u64> {
    let total_tickets = i32::try_from(booking.total_tickets).unwrap_or(i32::MAX);
    let result = if booking.version == 0 {
        sqlx::query(
            "INSERT INTO bookings (id, passenger, items, total_price, total_tickets, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(booking.id.as_uuid())
        .bind(Json(&booking.passenger))
        .bind(Json(&booking.items))
        .bind(booking.total_price)
        .bind(total_tickets)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            "UPDATE bookings
             SET passenger = $2, items = $3, total_price = $4, total_tickets = $5,
                 version = version + 1, updated_at = $6
             WHERE id = $1 AND version = $7",
        )
        .bind(booking.id.as_uuid())
        .bind(Json(&booking.passenger))
        .bind(Json(&booking.items))
        .bind(booking.total_price)
        .bind(total_tickets)
        .bind(booking.updated_at)
        .bind(booking.version)
        .execute(&mut **tx)
        .await?
    };
    Ok(result.rows_affected())
}

impl LedgerStore for PgStore {
    async fn trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        let row: Option<TripRow> = sqlx::query_as(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Trip::from))
    }

    async fn trips(&self) -> StoreResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips ORDER BY departure_date, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Trip::from).collect())
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Booking::from))
    }

    async fn bookings(&self) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn bookings_on_trip(&self, trip_id: TripId) -> StoreResult<Vec<Booking>> {
        // GIN index on items serves the containment lookup
        let probe = serde_json::json!([{ "trip_id": trip_id }]);
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE items @> $1 ORDER BY created_at, id"
        ))
        .bind(Json(probe))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn payments_for(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 ORDER BY created_at, seq"
        ))
        .bind(booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn payments(&self) -> StoreResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at, seq"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn audit_log(&self, booking_id: Option<BookingId>) -> StoreResult<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT id, booking_id, action, description, diff, created_at
             FROM audit_log
             WHERE $1::uuid IS NULL OR booking_id = $1
             ORDER BY created_at, seq",
        )
        .bind(booking_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn commit(&self, changes: Changeset) -> StoreResult<Committed> {
        let mut tx = self.pool.begin().await?;
        let mut committed = Committed::default();

        for trip in changes.trips {
            if write_trip(&mut tx, &trip).await? == 0 {
                tx.rollback().await?;
                return Err(conflict("trip", trip.id));
            }
            committed.trips.push(Trip {
                version: trip.version + 1,
                ..trip
            });
        }

        for booking in changes.bookings {
            if write_booking(&mut tx, &booking).await? == 0 {
                tx.rollback().await?;
                return Err(conflict("booking", booking.id));
            }
            committed.bookings.push(Booking {
                version: booking.version + 1,
                ..booking
            });
        }

        for booking in &changes.deleted_bookings {
            let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1 AND version = $2")
                .bind(booking.id.as_uuid())
                .bind(booking.version)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                tx.rollback().await?;
                return Err(conflict("booking", booking.id));
            }
        }

        if !changes.deleted_payments.is_empty() {
            let ids: Vec<Uuid> = changes.deleted_payments.iter().map(|id| *id.as_uuid()).collect();
            sqlx::query("DELETE FROM payments WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        for payment in &changes.payments {
            sqlx::query(
                "INSERT INTO payments (id, booking_id, cash_amount, transfer_amount, payment_type, transaction_type, note, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(payment.id.as_uuid())
            .bind(payment.booking_id.as_uuid())
            .bind(payment.cash_amount)
            .bind(payment.transfer_amount)
            .bind(payment.payment_type.as_str())
            .bind(payment.transaction_type.as_str())
            .bind(&payment.note)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &changes.audit {
            sqlx::query(
                "INSERT INTO audit_log (id, booking_id, action, description, diff, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(entry.id.as_uuid())
            .bind(entry.booking_id.map(|id| *id.as_uuid()))
            .bind(entry.action.as_str())
            .bind(&entry.description)
            .bind(&entry.diff)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        committed.payments = changes.payments;
        Ok(committed)
    }
}
