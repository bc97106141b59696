//! Domain models for Pedal Rental
//!
//! This module contains all the core domain models used throughout the application.

pub mod bike;
pub mod booking;
pub mod payment;
pub mod user;

pub use bike::Bike;
pub use booking::{
    intervals_overlap, Booking, BookingStatus, PaymentEvent, StatusPatch, Transition,
};
pub use payment::{
    classify_code, normalize_amount, to_minor_units, MerchantTransactionId, OrderRequest,
    OrderResponse, PaymentOutcome, ProviderOutcome, ProviderStatus,
};
pub use user::UserRole;
