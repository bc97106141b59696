//! Booking lifecycle management
//!
//! Owns creation of bookings and every later status change:
//! - Create bookings after availability and pricing checks
//! - Assign the payment reference once
//! - Funnel payment outcomes from all channels through one idempotent entry
//! - Operator status overrides

use chrono::{DateTime, Utc};
use pedal_core::{
    config::PaymentConfig,
    models::{
        normalize_amount, Booking, BookingStatus, PaymentEvent, PaymentOutcome, StatusPatch,
        Transition,
    },
    traits::{BikeRepository, BookingRepository, Pagination},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::availability::AvailabilityChecker;
use crate::constants::{DEFAULT_DEPOSIT, MAX_STATUS_ATTEMPTS};
use crate::pricing::compute_rental_price;

/// Settings for booking creation and payment application
#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Deposit recorded on new bookings, and assumed when a payment omits its amount
    pub deposit: Decimal,

    /// Status a successful payment leads to
    pub paid_status: BookingStatus,

    /// Delay before retrying a failed store call while applying a payment
    pub store_retry_delay: Duration,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            deposit: DEFAULT_DEPOSIT,
            paid_status: BookingStatus::DepositPaid,
            store_retry_delay: Duration::from_millis(250),
        }
    }
}

impl BookingSettings {
    pub fn from_config(config: &PaymentConfig) -> AppResult<Self> {
        Ok(Self {
            deposit: config.deposit()?,
            paid_status: config.paid_status()?,
            store_retry_delay: Duration::from_millis(config.store_retry_delay_ms),
        })
    }
}

/// Booking request
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub bike_id: Uuid,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Booking manager
///
/// Status changes driven by payments go through the transition table and a
/// compare-and-set on the stored status, so reports arriving concurrently
/// or out of order on different channels converge on the same state.
pub struct BookingManager {
    bikes: Arc<dyn BikeRepository>,
    bookings: Arc<dyn BookingRepository>,
    availability: AvailabilityChecker,
    settings: BookingSettings,
}

impl BookingManager {
    /// Create a new booking manager
    pub fn new(
        bikes: Arc<dyn BikeRepository>,
        bookings: Arc<dyn BookingRepository>,
        settings: BookingSettings,
    ) -> Self {
        let availability = AvailabilityChecker::new(bookings.clone());
        Self {
            bikes,
            bookings,
            availability,
            settings,
        }
    }

    pub fn settings(&self) -> &BookingSettings {
        &self.settings
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    /// Create a pending booking
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` if the interval is empty or inverted
    /// - `AppError::BikeNotFound` if the bike does not exist
    /// - `AppError::SlotUnavailable` if the slot is taken, either at the
    ///   pre-check or by a concurrent insert
    #[instrument(skip(self, request), fields(bike_id = %request.bike_id, user_id = %request.user_id))]
    pub async fn create(&self, request: NewBooking) -> AppResult<Booking> {
        if request.end_time <= request.start_time {
            return Err(AppError::Validation(
                "endTime must be after startTime".to_string(),
            ));
        }
        if request.user_id.trim().is_empty() {
            return Err(AppError::MissingField("userId".to_string()));
        }

        let bike = self
            .bikes
            .find_by_id(request.bike_id)
            .await?
            .ok_or_else(|| AppError::BikeNotFound(request.bike_id.to_string()))?;

        if !bike.is_available {
            warn!("Bike {} is not listed for rental", bike.id);
            return Err(AppError::Conflict(format!(
                "Bike {} is not available for rental",
                bike.id
            )));
        }
        if !bike.has_valid_rate() {
            return Err(AppError::Validation(format!(
                "Bike {} has no valid hourly rate",
                bike.id
            )));
        }

        if !self
            .availability
            .is_available(bike.id, request.start_time, request.end_time)
            .await?
        {
            debug!("Slot taken at pre-check");
            return Err(AppError::SlotUnavailable);
        }

        let quote = compute_rental_price(request.start_time, request.end_time, bike.hourly_rate);
        let booking = Booking::new(
            bike.id,
            request.user_id,
            request.start_time,
            request.end_time,
            quote.price,
            self.settings.deposit,
        );

        let created = self.bookings.create(&booking).await?;

        info!(
            booking_id = %created.id,
            total_price = %created.total_price,
            duration = %quote.formatted_duration,
            "Booking created"
        );

        Ok(created)
    }

    /// Find a booking or fail with `BookingNotFound`
    pub async fn get(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        self.bookings.list_by_user(user_id).await
    }

    pub async fn list_for_bike(&self, bike_id: Uuid) -> AppResult<Vec<Booking>> {
        self.bookings.list_by_bike(bike_id).await
    }

    /// Paginated listing for the admin console
    pub async fn list(
        &self,
        status: Option<BookingStatus>,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Booking>, i64)> {
        self.bookings
            .list(status, pagination.limit(), pagination.offset())
            .await
    }

    /// Set the payment reference if none is set yet
    ///
    /// The first reference wins; later calls leave it untouched and return
    /// the booking as stored.
    #[instrument(skip(self))]
    pub async fn assign_payment_reference(
        &self,
        booking_id: Uuid,
        reference_id: &str,
    ) -> AppResult<Booking> {
        let reference_id = reference_id.trim();
        if reference_id.is_empty() {
            return Err(AppError::MissingField("referenceId".to_string()));
        }

        // Surfaces BookingNotFound before touching the store
        self.get(booking_id).await?;

        if self
            .bookings
            .set_payment_reference_if_unset(booking_id, reference_id)
            .await?
        {
            info!("Payment reference assigned");
        } else {
            debug!("Payment reference already set, keeping the original");
        }

        self.get(booking_id).await
    }

    /// Apply a payment outcome reported by any channel
    ///
    /// Success moves the booking to the configured paid status and records
    /// the transaction id and the amount (minor units / 100, or the deposit
    /// when absent). Failure moves it to `payment_failed`. Repeated, late and
    /// out-of-order reports are no-ops.
    #[instrument(skip(self, outcome), fields(success = outcome.success))]
    pub async fn apply_payment_outcome(
        &self,
        booking_id: Uuid,
        outcome: &PaymentOutcome,
    ) -> AppResult<Booking> {
        let paid_amount = outcome
            .success
            .then(|| normalize_amount(outcome.amount_minor, self.settings.deposit));

        self.apply_event(
            booking_id,
            PaymentEvent::from(outcome.success),
            outcome.transaction_id.clone(),
            paid_amount,
        )
        .await
    }

    /// Record a fresh payment attempt; a failed booking re-enters `pending`
    #[instrument(skip(self))]
    pub async fn record_payment_initiated(&self, booking_id: Uuid) -> AppResult<Booking> {
        self.apply_event(booking_id, PaymentEvent::Initiated, None, None)
            .await
    }

    async fn apply_event(
        &self,
        booking_id: Uuid,
        event: PaymentEvent,
        transaction_id: Option<String>,
        paid_amount: Option<Decimal>,
    ) -> AppResult<Booking> {
        for attempt in 1..=MAX_STATUS_ATTEMPTS {
            let current = self
                .with_store_retry("load booking", move || self.bookings.find_by_id(booking_id))
                .await?
                .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

            let next = match current.status.next(event, self.settings.paid_status) {
                Transition::NoOp => {
                    debug!(status = %current.status, ?event, "Payment event absorbed");
                    return Ok(current);
                }
                Transition::To(next) => next,
            };

            let patch = StatusPatch {
                status: next,
                payment_transaction_id: transaction_id.clone(),
                paid_amount,
            };
            let patch = &patch;
            let expected = current.status;

            let updated = self
                .with_store_retry("update status", move || {
                    self.bookings
                        .compare_and_set_status(booking_id, expected, patch)
                })
                .await?;

            match updated {
                Some(booking) => {
                    info!(from = %current.status, to = %booking.status, ?event, "Booking status changed");
                    return Ok(booking);
                }
                None => {
                    debug!(attempt, "Status changed concurrently, re-reading");
                }
            }
        }

        warn!("Gave up applying {:?} after {} attempts", event, MAX_STATUS_ATTEMPTS);
        Err(AppError::Conflict(format!(
            "Booking {} is being updated concurrently",
            booking_id
        )))
    }

    /// Run a store call, retrying once after a fixed delay on store failure
    async fn with_store_retry<T, F, Fut>(&self, what: &str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match call().await {
            Err(e) if e.is_store_failure() => {
                warn!(error = %e, "Store failure during {}, retrying once", what);
                tokio::time::sleep(self.settings.store_retry_delay).await;
                call().await
            }
            other => other,
        }
    }

    /// Operator override; bypasses the transition table
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
    ) -> AppResult<Booking> {
        let updated = self
            .bookings
            .update_status(booking_id, &StatusPatch::status(new_status))
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        info!(to = %updated.status, "Booking status overridden");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pedal_core::models::Bike;
    use pedal_db::{InMemoryBikeRepository, InMemoryBookingRepository};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    struct Fixture {
        manager: BookingManager,
        bike: Bike,
    }

    fn fixture_with(settings: BookingSettings, bookings: Arc<dyn BookingRepository>) -> Fixture {
        let bike = Bike::new("Roadster", "city", dec!(50));
        let bikes = Arc::new(InMemoryBikeRepository::with_bikes([bike.clone()]));
        Fixture {
            manager: BookingManager::new(bikes, bookings, settings),
            bike,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            BookingSettings::default(),
            Arc::new(InMemoryBookingRepository::new()),
        )
    }

    fn request(bike_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> NewBooking {
        NewBooking {
            bike_id,
            user_id: "rider-1".to_string(),
            start_time: start,
            end_time: end,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_deposit_payment() {
        let f = fixture();

        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(9, 45)))
            .await
            .unwrap();
        assert_eq!(booking.total_price, dec!(50));
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.deposit_amount, dec!(42));

        let paid = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", Some(4200)))
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::DepositPaid);
        assert_eq!(paid.paid_amount, Some(dec!(42)));
        assert_eq!(paid.payment_transaction_id.as_deref(), Some("TXN-1"));
        // Frozen at creation
        assert_eq!(paid.total_price, dec!(50));
    }

    #[tokio::test]
    async fn test_duplicate_success_is_idempotent() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let first = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", Some(4200)))
            .await
            .unwrap();
        let second = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-2", Some(9900)))
            .await
            .unwrap();

        assert_eq!(second.status, first.status);
        assert_eq!(second.payment_transaction_id.as_deref(), Some("TXN-1"));
        assert_eq!(second.paid_amount, Some(dec!(42)));
    }

    #[tokio::test]
    async fn test_failure_after_success_does_not_regress() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        f.manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", None))
            .await
            .unwrap();
        let after = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::failed(Some("TXN-1".into())))
            .await
            .unwrap();

        assert_eq!(after.status, BookingStatus::DepositPaid);
    }

    #[tokio::test]
    async fn test_terminal_states_absorb_late_reports() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        f.manager
            .update_status(booking.id, BookingStatus::Completed)
            .await
            .unwrap();
        let after = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::failed(None))
            .await
            .unwrap();
        assert_eq!(after.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_then_retried_payment() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let failed = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::failed(Some("TXN-1".into())))
            .await
            .unwrap();
        assert_eq!(failed.status, BookingStatus::PaymentFailed);

        let retried = f.manager.record_payment_initiated(booking.id).await.unwrap();
        assert_eq!(retried.status, BookingStatus::Pending);

        let paid = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-2", Some(4200)))
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::DepositPaid);
        assert_eq!(paid.payment_transaction_id.as_deref(), Some("TXN-2"));
    }

    #[tokio::test]
    async fn test_fully_paid_configuration() {
        let settings = BookingSettings {
            paid_status: BookingStatus::FullyPaid,
            ..BookingSettings::default()
        };
        let f = fixture_with(settings, Arc::new(InMemoryBookingRepository::new()));
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let paid = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", Some(5000)))
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::FullyPaid);
        assert_eq!(paid.paid_amount, Some(dec!(50)));
    }

    #[tokio::test]
    async fn test_concurrent_reports_converge() {
        let f = Arc::new(fixture());
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = f.clone();
                tokio::spawn(async move {
                    let outcome = if i % 2 == 0 {
                        PaymentOutcome::succeeded(format!("TXN-{i}"), Some(4200))
                    } else {
                        PaymentOutcome::failed(None)
                    };
                    f.manager.apply_payment_outcome(booking.id, &outcome).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let settled = f.manager.get(booking.id).await.unwrap();
        assert_eq!(settled.status, BookingStatus::DepositPaid);
    }

    #[tokio::test]
    async fn test_create_validations() {
        let f = fixture();

        let err = f
            .manager
            .create(request(f.bike.id, at(10, 0), at(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = f
            .manager
            .create(request(Uuid::new_v4(), at(9, 0), at(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BikeNotFound(_)));

        f.manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();
        let err = f
            .manager
            .create(request(f.bike.id, at(9, 30), at(10, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable));
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_its_interval() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();
        f.manager
            .update_status(booking.id, BookingStatus::Cancelled)
            .await
            .unwrap();

        let again = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();
        assert_eq!(again.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_payment_reference_first_write_wins() {
        let f = fixture();
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        f.manager
            .assign_payment_reference(booking.id, "REF-A")
            .await
            .unwrap();
        let stored = f
            .manager
            .assign_payment_reference(booking.id, "REF-B")
            .await
            .unwrap();
        assert_eq!(stored.payment_reference_id.as_deref(), Some("REF-A"));

        let err = f
            .manager
            .assign_payment_reference(Uuid::new_v4(), "REF-C")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_booking_outcome_is_not_found() {
        let f = fixture();
        let err = f
            .manager
            .apply_payment_outcome(Uuid::new_v4(), &PaymentOutcome::failed(None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }

    /// Booking store whose status writes fail a fixed number of times
    struct FlakyBookings {
        inner: InMemoryBookingRepository,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BookingRepository for FlakyBookings {
        async fn create(&self, booking: &Booking) -> AppResult<Booking> {
            self.inner.create(booking).await
        }
        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
            self.inner.find_by_id(id).await
        }
        async fn find_blocking(
            &self,
            bike_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> AppResult<Vec<Booking>> {
            self.inner.find_blocking(bike_id, start, end).await
        }
        async fn list_by_bike(&self, bike_id: Uuid) -> AppResult<Vec<Booking>> {
            self.inner.list_by_bike(bike_id).await
        }
        async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
            self.inner.list_by_user(user_id).await
        }
        async fn list(
            &self,
            status: Option<BookingStatus>,
            limit: i64,
            offset: i64,
        ) -> AppResult<(Vec<Booking>, i64)> {
            self.inner.list(status, limit, offset).await
        }
        async fn set_payment_reference_if_unset(&self, id: Uuid, reference: &str) -> AppResult<bool> {
            self.inner.set_payment_reference_if_unset(id, reference).await
        }
        async fn compare_and_set_status(
            &self,
            id: Uuid,
            expected: BookingStatus,
            patch: &StatusPatch,
        ) -> AppResult<Option<Booking>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(AppError::Database("connection reset".to_string()));
            }
            self.inner.compare_and_set_status(id, expected, patch).await
        }
        async fn update_status(&self, id: Uuid, patch: &StatusPatch) -> AppResult<Option<Booking>> {
            self.inner.update_status(id, patch).await
        }
    }

    fn flaky(failures: usize) -> Arc<FlakyBookings> {
        Arc::new(FlakyBookings {
            inner: InMemoryBookingRepository::new(),
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        })
    }

    fn fast_retry() -> BookingSettings {
        BookingSettings {
            store_retry_delay: Duration::from_millis(1),
            ..BookingSettings::default()
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_retried_once() {
        let store = flaky(1);
        let f = fixture_with(fast_retry(), store.clone());
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let paid = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", Some(4200)))
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::DepositPaid);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_store_failure_is_surfaced() {
        let store = flaky(2);
        let f = fixture_with(fast_retry(), store.clone());
        let booking = f
            .manager
            .create(request(f.bike.id, at(9, 0), at(10, 0)))
            .await
            .unwrap();

        let err = f
            .manager
            .apply_payment_outcome(booking.id, &PaymentOutcome::succeeded("TXN-1", Some(4200)))
            .await
            .unwrap_err();
        assert!(err.is_store_failure());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        let unchanged = f.manager.get(booking.id).await.unwrap();
        assert_eq!(unchanged.status, BookingStatus::Pending);
    }
}
