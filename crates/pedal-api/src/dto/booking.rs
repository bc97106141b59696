//! Booking DTOs
//!
//! Request and response types for booking, availability and pricing endpoints.

use super::common::money;
use chrono::{DateTime, Utc};
use pedal_core::models::{Booking, BookingStatus};
use pedal_services::pricing::{LineItem, RentalQuote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Booking creation request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub bike_id: Uuid,

    /// Defaults to the authenticated user
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,
}

/// Booking creation response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreatedResponse {
    pub booking_id: Uuid,
    pub total_price: f64,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingCreatedResponse {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id,
            total_price: money(b.total_price),
            status: b.status,
        }
    }
}

/// Full booking view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub bike_id: Uuid,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub deposit_amount: f64,
    pub paid_amount: Option<f64>,
    pub payment_reference_id: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            bike_id: b.bike_id,
            user_id: b.user_id,
            start_time: b.start_time,
            end_time: b.end_time,
            status: b.status,
            total_price: money(b.total_price),
            deposit_amount: money(b.deposit_amount),
            paid_amount: b.paid_amount.map(money),
            payment_reference_id: b.payment_reference_id,
            payment_transaction_id: b.payment_transaction_id,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Filters for `GET /bookings`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQueryParams {
    pub user_id: Option<String>,
    pub bike_id: Option<Uuid>,
}

/// Filters for the admin listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminBookingFilter {
    pub status: Option<String>,
}

/// Admin status override
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Admin payment reference assignment
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReferenceRequest {
    #[validate(length(min = 1, max = 128))]
    pub reference_id: String,
}

/// Availability query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub bike_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Availability answer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    pub bike_id: Uuid,
}

/// Pricing quote query
///
/// Missing fields produce the zero quote rather than an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub hourly_rate: Option<Decimal>,
}

/// Priced line item
#[derive(Debug, Clone, Serialize)]
pub struct LineItemResponse {
    pub description: String,
    pub amount: f64,
}

/// Pricing quote
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub price: f64,
    pub duration: DurationResponse,
    pub formatted_duration: String,
    pub breakdown: Vec<LineItemResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationResponse {
    pub hours: i64,
    pub minutes: i64,
    pub total_minutes: i64,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            description: item.description,
            amount: money(item.amount),
        }
    }
}

impl From<RentalQuote> for QuoteResponse {
    fn from(q: RentalQuote) -> Self {
        Self {
            price: money(q.price),
            duration: DurationResponse {
                hours: q.duration.hours,
                minutes: q.duration.minutes,
                total_minutes: q.duration.total_minutes,
            },
            formatted_duration: q.formatted_duration,
            breakdown: q.breakdown.into_iter().map(Into::into).collect(),
        }
    }
}
