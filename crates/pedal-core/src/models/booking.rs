//! Booking model and status transition table
//!
//! A booking moves through its lifecycle only via [`BookingStatus::next`],
//! which is the single place where payment-driven ordering is decided.
//! Operator overrides bypass the table on purpose.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, waiting for the deposit
    #[default]
    Pending,
    /// Deposit received through a payment channel
    DepositPaid,
    /// Whole rental paid
    FullyPaid,
    /// Verified by staff, independent of the payment channel
    Confirmed,
    /// Rental finished
    Completed,
    /// Cancelled by an operator
    Cancelled,
    /// Last payment attempt failed; a fresh attempt may follow
    PaymentFailed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::DepositPaid => write!(f, "deposit_paid"),
            BookingStatus::FullyPaid => write!(f, "fully_paid"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::PaymentFailed => write!(f, "payment_failed"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "deposit_paid" => Some(BookingStatus::DepositPaid),
            "fully_paid" => Some(BookingStatus::FullyPaid),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "payment_failed" => Some(BookingStatus::PaymentFailed),
            _ => None,
        }
    }

    /// Terminal states never change through payment events
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Whether a booking in this state occupies its time slot
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    /// Transition table for payment-driven events
    ///
    /// `paid` is the configured status a successful payment leads to
    /// (`DepositPaid` or `FullyPaid`). Any pair not listed is a no-op, which
    /// absorbs duplicates and out-of-order deliveries.
    pub fn next(self, event: PaymentEvent, paid: BookingStatus) -> Transition {
        use BookingStatus::*;

        match (self, event) {
            (Cancelled | Completed, _) => Transition::NoOp,
            (Pending | PaymentFailed, PaymentEvent::Succeeded) => Transition::To(paid),
            (DepositPaid, PaymentEvent::Succeeded) if paid == FullyPaid => Transition::To(FullyPaid),
            (Pending, PaymentEvent::Failed) => Transition::To(PaymentFailed),
            (PaymentFailed, PaymentEvent::Initiated) => Transition::To(Pending),
            _ => Transition::NoOp,
        }
    }
}

/// Events produced by payment channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    /// A fresh payment attempt was started
    Initiated,
    /// Provider reported success
    Succeeded,
    /// Provider reported failure
    Failed,
}

impl From<bool> for PaymentEvent {
    fn from(success: bool) -> Self {
        if success {
            PaymentEvent::Succeeded
        } else {
            PaymentEvent::Failed
        }
    }
}

/// Result of a transition table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(BookingStatus),
    NoOp,
}

/// Half-open interval overlap: `[start, end)` against `[other_start, other_end)`
///
/// Covers the candidate starting inside, ending inside, or containing the
/// existing interval. Touching endpoints do not overlap.
pub fn intervals_overlap(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> bool {
    let starts_inside = start >= other_start && start < other_end;
    let ends_inside = end > other_start && end <= other_end;
    let contains = start <= other_start && end >= other_end;

    starts_inside || ends_inside || contains
}

/// Booking entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    /// Unique identifier
    pub id: Uuid,

    /// Booked bike
    pub bike_id: Uuid,

    /// Customer identifier from the identity provider
    pub user_id: String,

    /// Start of the rental (inclusive)
    pub start_time: DateTime<Utc>,

    /// End of the rental (exclusive)
    pub end_time: DateTime<Utc>,

    /// Current status
    pub status: BookingStatus,

    /// Price frozen at creation
    pub total_price: Decimal,

    /// User-facing payment correlation code, written once
    pub payment_reference_id: Option<String>,

    /// Provider transaction id recorded on payment resolution
    pub payment_transaction_id: Option<String>,

    /// Flat deposit charged to hold the booking
    pub deposit_amount: Decimal,

    /// Amount reported by the payment channel, in major units
    pub paid_amount: Option<Decimal>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new pending booking
    pub fn new(
        bike_id: Uuid,
        user_id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        total_price: Decimal,
        deposit_amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            bike_id,
            user_id,
            start_time,
            end_time,
            status: BookingStatus::Pending,
            total_price,
            payment_reference_id: None,
            payment_transaction_id: None,
            deposit_amount,
            paid_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether this booking blocks `[start, end)` on its bike
    pub fn conflicts_with(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status.blocks_slot() && intervals_overlap(start, end, self.start_time, self.end_time)
    }

    /// Apply a status patch in place
    pub fn apply(&mut self, patch: &StatusPatch) {
        self.status = patch.status;
        if let Some(tx) = &patch.payment_transaction_id {
            self.payment_transaction_id = Some(tx.clone());
        }
        if let Some(amount) = patch.paid_amount {
            self.paid_amount = Some(amount);
        }
        self.updated_at = Utc::now();
    }
}

/// Fields written together with a status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    pub status: BookingStatus,
    pub payment_transaction_id: Option<String>,
    pub paid_amount: Option<Decimal>,
}

impl StatusPatch {
    /// Patch that only changes the status
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status,
            payment_transaction_id: None,
            paid_amount: None,
        }
    }
}
