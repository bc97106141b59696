//! Availability and pricing handlers
//!
//! Public read-only endpoints used by the booking form.

use crate::dto::{AvailabilityQuery, AvailabilityResponse, QuoteQuery, QuoteResponse};
use actix_web::{web, HttpResponse};
use pedal_core::AppError;
use pedal_services::{compute_rental_price, BookingManager, RentalQuote};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Check whether a bike is free for an interval
///
/// GET /api/v1/availability?bikeId&startTime&endTime
#[instrument(skip(manager))]
pub async fn check_availability(
    manager: web::Data<Arc<BookingManager>>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, AppError> {
    let available = manager
        .availability()
        .is_available(query.bike_id, query.start_time, query.end_time)
        .await?;

    debug!(available, "Availability checked");

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        available,
        bike_id: query.bike_id,
    }))
}

/// Price an interval at an hourly rate
///
/// GET /api/v1/pricing/quote?startTime&endTime&hourlyRate
#[instrument]
pub async fn quote_price(query: web::Query<QuoteQuery>) -> Result<HttpResponse, AppError> {
    let quote = match (query.start_time, query.end_time, query.hourly_rate) {
        (Some(start), Some(end), Some(rate)) => compute_rental_price(start, end, rate),
        _ => RentalQuote::zero(),
    };

    Ok(HttpResponse::Ok().json(QuoteResponse::from(quote)))
}

/// Configure availability and pricing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/availability", web::get().to(check_availability))
        .route("/pricing/quote", web::get().to(quote_price));
}
