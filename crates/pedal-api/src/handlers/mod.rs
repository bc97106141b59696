//! HTTP request handlers

pub mod admin;
pub mod availability;
pub mod bike;
pub mod booking;
pub mod health;
pub mod payment;

pub use admin::configure as configure_admin;
pub use availability::configure as configure_availability;
pub use bike::configure as configure_bikes;
pub use booking::configure as configure_bookings;
pub use health::configure as configure_health;
pub use payment::configure as configure_payments;
