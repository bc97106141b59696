//! Collaborator traits
//!
//! Stores, the payment provider, signature checks and rate limiting are all
//! reached through these seams so the booking services can run against
//! Postgres in production and in-memory doubles in tests.

use crate::error::AppError;
use crate::models::{
    Bike, Booking, BookingStatus, OrderRequest, OrderResponse, ProviderStatus, StatusPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<T, AppError>;
}

/// Bike catalog store
#[async_trait]
pub trait BikeRepository: Repository<Bike, Uuid> {
    /// List bikes whose listing flag is set
    async fn list_listed(&self, limit: i64, offset: i64) -> Result<(Vec<Bike>, i64), AppError>;
}

/// Booking store
///
/// Status writes go through `compare_and_set_status` so that concurrent
/// payment reports cannot overwrite each other.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a booking
    ///
    /// Fails with `AppError::SlotUnavailable` when a non-cancelled booking of
    /// the same bike overlaps the interval. The check and the insert are atomic.
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError>;

    /// Find booking by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    /// Non-cancelled bookings of a bike overlapping `[start, end)`
    async fn find_blocking(
        &self,
        bike_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    /// All bookings of a bike, oldest start first
    async fn list_by_bike(&self, bike_id: Uuid) -> Result<Vec<Booking>, AppError>;

    /// All bookings of a user, newest first
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError>;

    /// List bookings with optional status filter
    async fn list(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Booking>, i64), AppError>;

    /// Record the payment reference unless one is already set
    ///
    /// Returns `true` when this call wrote the reference.
    async fn set_payment_reference_if_unset(
        &self,
        id: Uuid,
        reference: &str,
    ) -> Result<bool, AppError>;

    /// Apply `patch` only if the stored status still equals `expected`
    ///
    /// Returns the updated booking, or `None` when the booking is missing or
    /// its status moved on in the meantime.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &StatusPatch,
    ) -> Result<Option<Booking>, AppError>;

    /// Apply `patch` unconditionally
    async fn update_status(&self, id: Uuid, patch: &StatusPatch)
        -> Result<Option<Booking>, AppError>;
}

/// External payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment order and obtain the checkout URL
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse, AppError>;

    /// Query the provider for the state of a merchant transaction
    async fn get_status(&self, merchant_transaction_id: &str) -> Result<ProviderStatus, AppError>;
}

/// Webhook signature check over the raw request body
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` when `signature` authenticates `raw_body` under `secret`
    fn verify(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool;
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the oldest counted request leaves the window
    pub retry_after_secs: u64,
}

impl RateDecision {
    pub fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: 0,
        }
    }

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs: retry_after_secs.max(1),
        }
    }
}

/// Request rate limiter keyed by client identity
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` and decide whether it may proceed
    async fn check(&self, key: &str) -> Result<RateDecision, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
