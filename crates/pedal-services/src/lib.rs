//! Business logic services for Pedal Rental
//!
//! This crate contains the booking engine: pricing, slot availability,
//! the booking lifecycle, and payment reconciliation across the redirect
//! callback, the provider webhook and the internal update endpoint.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service owns its collaborators as `Arc<dyn Trait>`
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Errors are reported as `AppError`
//!
//! # Services
//!
//! - `pricing` - Pure duration and price calculation
//! - `AvailabilityChecker` - Overlap queries against the booking store
//! - `BookingManager` - Booking creation and status lifecycle
//! - `PaymentGateway` - Payment initiation and reconciliation
//! - `HttpPaymentProvider` - Provider REST client
//! - `HmacSignatureVerifier` - Webhook authentication

pub mod availability;
pub mod booking_manager;
pub mod pricing;
pub mod provider;
pub mod reconciliation;
pub mod signature;

pub use availability::AvailabilityChecker;
pub use booking_manager::{BookingManager, BookingSettings, NewBooking};
pub use pricing::{compute_duration, compute_rental_price, price_breakdown, RentalQuote};
pub use provider::{HttpPaymentProvider, ProviderSettings};
pub use reconciliation::{
    CallbackResult, CallbackStatus, GatewaySettings, InternalUpdate, PaymentGateway,
    PaymentInitiation, WebhookAck,
};
pub use signature::HmacSignatureVerifier;

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Minutes past a billed hour that still count as that hour
    pub const GRACE_MINUTES: i64 = 10;

    /// Rentals up to this length pay one hourly rate
    pub const MINIMUM_CHARGE_MINUTES: i64 = 70;

    /// Rentals up to this length pay 1.5 hourly rates
    pub const TWO_HOUR_TIER_MINUTES: i64 = 120;

    /// Default booking-hold deposit in major units
    pub const DEFAULT_DEPOSIT: Decimal = dec!(42);

    /// Compare-and-set rounds before a status change gives up
    pub const MAX_STATUS_ATTEMPTS: u32 = 5;
}
