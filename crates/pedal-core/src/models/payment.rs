//! Payment channel types
//!
//! Provider amounts travel in minor units (paise); bookings record major units.

use crate::error::AppError;
use crate::AppResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Provider code reported for a settled payment
pub const CODE_PAYMENT_SUCCESS: &str = "PAYMENT_SUCCESS";

/// Provider codes for payments that are still in flight
pub const PENDING_CODES: [&str; 2] = ["PAYMENT_PENDING", "PAYMENT_INITIATED"];

/// Normalized payment report fed into the booking funnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    /// Amount in minor units as reported by the provider
    pub amount_minor: Option<i64>,
}

impl PaymentOutcome {
    pub fn succeeded(transaction_id: impl Into<String>, amount_minor: Option<i64>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            amount_minor,
        }
    }

    pub fn failed(transaction_id: Option<String>) -> Self {
        Self {
            success: false,
            transaction_id,
            amount_minor: None,
        }
    }
}

/// Convert a provider amount into major units, defaulting to `fallback`
pub fn normalize_amount(amount_minor: Option<i64>, fallback: Decimal) -> Decimal {
    amount_minor
        .map(|minor| Decimal::new(minor, 2))
        .unwrap_or(fallback)
}

/// Convert a major-unit amount into provider minor units
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or_default()
}

/// Merchant transaction id: `<prefix>_<bookingId>_<timestamp>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantTransactionId {
    pub prefix: String,
    pub booking_id: Uuid,
    pub timestamp: i64,
}

impl MerchantTransactionId {
    pub fn new(prefix: impl Into<String>, booking_id: Uuid, timestamp: i64) -> Self {
        Self {
            prefix: prefix.into(),
            booking_id,
            timestamp,
        }
    }

    /// Parse an id received from a payment channel
    ///
    /// The booking id is taken positionally from the second segment.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let invalid = |reason: &str| AppError::InvalidTransactionId(format!("{raw}: {reason}"));

        let mut parts = raw.trim().split('_');
        let (Some(prefix), Some(booking), Some(timestamp), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected <prefix>_<bookingId>_<timestamp>"));
        };

        if prefix.is_empty() {
            return Err(invalid("empty prefix"));
        }
        if booking.is_empty() {
            return Err(invalid("empty booking id"));
        }

        let booking_id = Uuid::parse_str(booking).map_err(|_| invalid("booking id is not a UUID"))?;
        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| invalid("timestamp is not numeric"))?;

        Ok(Self {
            prefix: prefix.to_string(),
            booking_id,
            timestamp,
        })
    }
}

impl fmt::Display for MerchantTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.prefix, self.booking_id, self.timestamp)
    }
}

/// Order creation request sent to the provider
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub merchant_transaction_id: String,
    pub merchant_user_id: String,
    pub amount_minor: i64,
    pub redirect_url: String,
    pub callback_url: String,
}

/// Provider answer to an order creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderResponse {
    pub payment_url: String,
    pub provider_order_id: String,
}

/// Provider view of a transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
    pub code: String,
    pub amount: Option<i64>,
    pub transaction_id: Option<String>,
}

/// Classification of a provider code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    Success,
    Pending,
    Failure,
}

impl ProviderStatus {
    pub fn outcome(&self) -> ProviderOutcome {
        classify_code(&self.code)
    }
}

/// Map a provider code onto an outcome
pub fn classify_code(code: &str) -> ProviderOutcome {
    if code == CODE_PAYMENT_SUCCESS {
        ProviderOutcome::Success
    } else if PENDING_CODES.contains(&code) {
        ProviderOutcome::Pending
    } else {
        ProviderOutcome::Failure
    }
}
