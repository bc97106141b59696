//! API layer for Pedal Rental
//!
//! HTTP handlers for bookings, availability, pricing quotes, payments and the
//! admin console.
//!
//! Handlers expect these in app data:
//! - `web::Data<Arc<BookingManager>>`
//! - `web::Data<Arc<PaymentGateway>>`
//! - `web::Data<Arc<dyn BikeRepository>>`
//! - `web::Data<Arc<dyn RateLimiter>>`
//! - `web::Data<Arc<JwtService>>` and `web::Data<InternalAuth>` for the extractors

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod rate_limit;

use actix_web::web;

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

pub use handlers::{
    configure_admin, configure_availability, configure_bikes, configure_bookings,
    configure_health, configure_payments,
};
pub use rate_limit::InMemoryRateLimiter;

/// Mount every route under `/api/v1`
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_health)
            .configure(configure_bikes)
            .configure(configure_availability)
            .configure(configure_bookings)
            .configure(configure_payments)
            .configure(configure_admin),
    );
}
