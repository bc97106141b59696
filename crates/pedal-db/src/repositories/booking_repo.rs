//! Booking repository implementation
//!
//! Slot exclusivity is enforced by the `bookings_no_overlap` exclusion
//! constraint, so two concurrent inserts for the same bike and interval can
//! never both commit. Status changes are conditional updates keyed on the
//! status the caller last observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pedal_core::{
    models::{Booking, BookingStatus, StatusPatch},
    traits::BookingRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// SQLSTATE raised by an exclusion constraint
const EXCLUSION_VIOLATION: &str = "23P01";

/// SQLSTATE raised by a foreign key constraint
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// SQLSTATE raised by a unique constraint
const UNIQUE_VIOLATION: &str = "23505";

const BOOKING_COLUMNS: &str = r#"
    id, bike_id, user_id, start_time, end_time, status, total_price,
    payment_reference_id, payment_transaction_id, deposit_amount, paid_amount,
    created_at, updated_at
"#;

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert database status string to enum
    fn parse_status(s: &str) -> AppResult<BookingStatus> {
        BookingStatus::from_str(s).ok_or_else(|| {
            warn!("Unknown booking status in database: {}", s);
            AppError::Database(format!("Unknown booking status '{}'", s))
        })
    }

    fn sqlstate(e: &sqlx::Error) -> Option<String> {
        e.as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned())
    }

    /// Map a write error, translating constraint violations
    fn map_write_error(e: sqlx::Error, booking_id: Uuid, context: &str) -> AppError {
        match Self::sqlstate(&e).as_deref() {
            Some(EXCLUSION_VIOLATION) => {
                debug!("Slot conflict writing booking {}", booking_id);
                AppError::SlotUnavailable
            }
            Some(FOREIGN_KEY_VIOLATION) => AppError::BikeNotFound(format!(
                "bike referenced by booking {} does not exist",
                booking_id
            )),
            Some(UNIQUE_VIOLATION) => {
                AppError::Conflict(format!("Duplicate value on booking {}", booking_id))
            }
            _ => {
                error!("Database error {} {}: {}", context, booking_id, e);
                AppError::Database(format!("Failed to {}: {}", context, e))
            }
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, bike_id = %booking.bike_id))]
    async fn create(&self, booking: &Booking) -> AppResult<Booking> {
        debug!("Inserting booking");

        let query = format!(
            r#"
            INSERT INTO bookings (
                id, bike_id, user_id, start_time, end_time, status, total_price,
                payment_reference_id, payment_transaction_id, deposit_amount, paid_amount,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(booking.id)
            .bind(booking.bike_id)
            .bind(&booking.user_id)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(booking.status.to_string())
            .bind(booking.total_price)
            .bind(&booking.payment_reference_id)
            .bind(&booking.payment_transaction_id)
            .bind(booking.deposit_amount)
            .bind(booking.paid_amount)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, booking.id, "create booking"))?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding booking {}: {}", id, e);
                AppError::Database(format!("Failed to find booking: {}", e))
            })?;

        row.map(Booking::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_blocking(
        &self,
        bike_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let query = format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE bike_id = $1
              AND status <> 'cancelled'
              AND start_time < $3
              AND end_time > $2
            ORDER BY start_time
            "#
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(bike_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error checking slot for bike {}: {}", bike_id, e);
                AppError::Database(format!("Failed to check availability: {}", e))
            })?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_bike(&self, bike_id: Uuid) -> AppResult<Vec<Booking>> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE bike_id = $1 ORDER BY start_time"
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(bike_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings for bike {}: {}", bike_id, e);
                AppError::Database(format!("Failed to list bookings: {}", e))
            })?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings for user {}: {}", user_id, e);
                AppError::Database(format!("Failed to list bookings: {}", e))
            })?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Booking>, i64)> {
        let status = status.map(|s| s.to_string());
        let query = format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(&status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings: {}", e);
                AppError::Database(format!("Failed to list bookings: {}", e))
            })?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE ($1::text IS NULL OR status = $1)")
                .bind(&status)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error counting bookings: {}", e);
                    AppError::Database(format!("Failed to count bookings: {}", e))
                })?;

        let bookings = rows
            .into_iter()
            .map(Booking::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((bookings, total.0))
    }

    #[instrument(skip(self))]
    async fn set_payment_reference_if_unset(&self, id: Uuid, reference: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_reference_id = $2,
                updated_at = NOW()
            WHERE id = $1 AND payment_reference_id IS NULL
            "#,
        )
        .bind(id)
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, id, "assign payment reference"))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, patch), fields(to = %patch.status))]
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &StatusPatch,
    ) -> AppResult<Option<Booking>> {
        let query = format!(
            r#"
            UPDATE bookings
            SET status = $3,
                payment_transaction_id = COALESCE($4, payment_transaction_id),
                paid_amount = COALESCE($5, paid_amount),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(id)
            .bind(expected.to_string())
            .bind(patch.status.to_string())
            .bind(&patch.payment_transaction_id)
            .bind(patch.paid_amount)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, id, "update booking status"))?;

        row.map(Booking::try_from).transpose()
    }

    #[instrument(skip(self, patch), fields(to = %patch.status))]
    async fn update_status(&self, id: Uuid, patch: &StatusPatch) -> AppResult<Option<Booking>> {
        let query = format!(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_transaction_id = COALESCE($3, payment_transaction_id),
                paid_amount = COALESCE($4, paid_amount),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&query)
            .bind(id)
            .bind(patch.status.to_string())
            .bind(&patch.payment_transaction_id)
            .bind(patch.paid_amount)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, id, "override booking status"))?;

        row.map(Booking::try_from).transpose()
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    bike_id: Uuid,
    user_id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    total_price: Decimal,
    payment_reference_id: Option<String>,
    payment_transaction_id: Option<String>,
    deposit_amount: Decimal,
    paid_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            bike_id: row.bike_id,
            user_id: row.user_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: PgBookingRepository::parse_status(&row.status)?,
            total_price: row.total_price,
            payment_reference_id: row.payment_reference_id,
            payment_transaction_id: row.payment_transaction_id,
            deposit_amount: row.deposit_amount,
            paid_amount: row.paid_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_rejects_unknown_values() {
        assert_eq!(
            PgBookingRepository::parse_status("deposit_paid").unwrap(),
            BookingStatus::DepositPaid
        );
        assert!(matches!(
            PgBookingRepository::parse_status("mystery"),
            Err(AppError::Database(_))
        ));
    }

    #[test]
    fn test_row_with_unknown_status_is_not_a_pending_booking() {
        let now = Utc::now();
        let row = BookingRow {
            id: Uuid::new_v4(),
            bike_id: Uuid::new_v4(),
            user_id: "rider-1".to_string(),
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            status: "archived".to_string(),
            total_price: Decimal::from(100),
            payment_reference_id: None,
            payment_transaction_id: None,
            deposit_amount: Decimal::from(42),
            paid_amount: None,
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(Booking::try_from(row), Err(AppError::Database(_))));
    }
}
