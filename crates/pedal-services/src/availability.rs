//! Slot availability checks
//!
//! Answers are point-in-time. Two requests may both see a free slot; the
//! store rejects the second insert, so the check is advisory only.

use chrono::{DateTime, Utc};
use pedal_core::{models::Booking, traits::BookingRepository, AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Checks whether a bike is free for an interval
#[derive(Clone)]
pub struct AvailabilityChecker {
    bookings: Arc<dyn BookingRepository>,
}

impl AvailabilityChecker {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    /// Non-cancelled bookings of `bike_id` overlapping `[start, end)`
    ///
    /// # Errors
    ///
    /// `AppError::Validation` when `end <= start`
    #[instrument(skip(self))]
    pub async fn conflicts(
        &self,
        bike_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        if end <= start {
            return Err(AppError::Validation(
                "endTime must be after startTime".to_string(),
            ));
        }

        let conflicts = self.bookings.find_blocking(bike_id, start, end).await?;
        debug!(conflicts = conflicts.len(), "Checked slot");
        Ok(conflicts)
    }

    /// `true` when no non-cancelled booking overlaps `[start, end)`
    pub async fn is_available(
        &self,
        bike_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self.conflicts(bike_id, start, end).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pedal_core::models::{BookingStatus, StatusPatch};
    use pedal_db::InMemoryBookingRepository;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    async fn seed(repo: &InMemoryBookingRepository, bike: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
        let booking = Booking::new(bike, "rider".to_string(), start, end, dec!(100), dec!(42));
        repo.create(&booking).await.unwrap()
    }

    #[tokio::test]
    async fn test_adjacent_bookings_and_straddling_request() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let checker = AvailabilityChecker::new(repo.clone());
        let bike = Uuid::new_v4();

        seed(&repo, bike, at(10, 0), at(11, 0)).await;
        seed(&repo, bike, at(11, 0), at(12, 0)).await;

        assert!(!checker.is_available(bike, at(10, 30), at(11, 30)).await.unwrap());
        assert!(checker.is_available(bike, at(12, 0), at(13, 0)).await.unwrap());
        assert!(checker.is_available(bike, at(9, 0), at(10, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_overlap_shapes_conflict() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let checker = AvailabilityChecker::new(repo.clone());
        let bike = Uuid::new_v4();
        seed(&repo, bike, at(10, 0), at(12, 0)).await;

        // starts inside, ends inside, contains, contained
        for (s, e) in [
            (at(11, 0), at(13, 0)),
            (at(9, 0), at(10, 30)),
            (at(9, 0), at(13, 0)),
            (at(10, 15), at(11, 45)),
        ] {
            assert!(!checker.is_available(bike, s, e).await.unwrap());
        }

        // Other bikes are unaffected
        assert!(checker
            .is_available(Uuid::new_v4(), at(10, 0), at(12, 0))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_booking_does_not_block() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let checker = AvailabilityChecker::new(repo.clone());
        let bike = Uuid::new_v4();

        let booking = seed(&repo, bike, at(10, 0), at(11, 0)).await;
        repo.update_status(booking.id, &StatusPatch::status(BookingStatus::Cancelled))
            .await
            .unwrap();

        assert!(checker.is_available(bike, at(10, 0), at(11, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_inverted_interval_is_rejected() {
        let checker = AvailabilityChecker::new(Arc::new(InMemoryBookingRepository::new()));
        let err = checker
            .is_available(Uuid::new_v4(), at(11, 0), at(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
