//! Booking handlers
//!
//! HTTP handlers for creating and reading bookings.

use crate::dto::{
    ApiResponse, BookingCreatedResponse, BookingQueryParams, BookingResponse, CreateBookingRequest,
};
use actix_web::{web, HttpResponse};
use pedal_auth::AuthenticatedUser;
use pedal_core::AppError;
use pedal_services::{BookingManager, NewBooking};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Create a booking
///
/// POST /api/v1/bookings
#[instrument(skip(manager, user, req), fields(user_id = %user.user_id))]
pub async fn create_booking(
    manager: web::Data<Arc<BookingManager>>,
    user: AuthenticatedUser,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Booking validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let req = req.into_inner();
    let user_id = req.user_id.unwrap_or_else(|| user.user_id.clone());
    if !user.can_access(&user_id) {
        warn!(requested_for = %user_id, "Customer tried to book for someone else");
        return Err(AppError::Forbidden);
    }

    let booking = manager
        .create(NewBooking {
            bike_id: req.bike_id,
            user_id,
            start_time: req.start_time,
            end_time: req.end_time,
        })
        .await?;

    info!(booking_id = %booking.id, "Booking created via API");

    Ok(HttpResponse::Created().json(BookingCreatedResponse::from(&booking)))
}

/// Get a single booking
///
/// GET /api/v1/bookings/{id}
#[instrument(skip(manager, user))]
pub async fn get_booking(
    manager: web::Data<Arc<BookingManager>>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let booking = manager.get(path.into_inner()).await?;

    if !user.can_access(&booking.user_id) {
        return Err(AppError::Forbidden);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// List bookings of a user or a bike
///
/// GET /api/v1/bookings?userId= | ?bikeId=
///
/// Customers only see their own bookings; per-bike listings are staff only.
#[instrument(skip(manager, user))]
pub async fn list_bookings(
    manager: web::Data<Arc<BookingManager>>,
    user: AuthenticatedUser,
    query: web::Query<BookingQueryParams>,
) -> Result<HttpResponse, AppError> {
    let bookings = match (&query.bike_id, &query.user_id) {
        (Some(bike_id), _) => {
            if !user.is_staff() {
                return Err(AppError::Forbidden);
            }
            manager.list_for_bike(*bike_id).await?
        }
        (None, user_id) => {
            let user_id = user_id.as_deref().unwrap_or(&user.user_id);
            if !user.can_access(user_id) {
                return Err(AppError::Forbidden);
            }
            manager.list_for_user(user_id).await?
        }
    };

    debug!(count = bookings.len(), "Listed bookings");

    let data: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

/// Configure booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(create_booking))
            .route("", web::get().to(list_bookings))
            .route("/{id}", web::get().to(get_booking)),
    );
}
