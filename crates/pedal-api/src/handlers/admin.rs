//! Admin console handlers
//!
//! Booking overrides and catalog management. Every route requires the admin
//! role.

use crate::dto::{
    AdminBookingFilter, ApiResponse, BikeResponse, BookingResponse, CreateBikeRequest,
    PaginationParams, PaymentReferenceRequest, StatusUpdateRequest, UpdateBikeRequest,
};
use actix_web::{web, HttpResponse};
use pedal_auth::AdminUser;
use pedal_core::models::BookingStatus;
use pedal_core::traits::BikeRepository;
use pedal_core::AppError;
use pedal_services::BookingManager;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// List bookings with an optional status filter
///
/// GET /api/v1/admin/bookings
#[instrument(skip(manager, _admin))]
pub async fn list_bookings(
    manager: web::Data<Arc<BookingManager>>,
    query: web::Query<PaginationParams>,
    filter: web::Query<AdminBookingFilter>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let status = filter
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::from_str(s)
                .ok_or_else(|| AppError::InvalidInput(format!("Unknown booking status '{}'", s)))
        })
        .transpose()?;

    let (bookings, total) = manager.list(status, &query.pagination()).await?;
    debug!(total, "Listed bookings for admin");

    let data: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Override a booking status
///
/// PATCH /api/v1/admin/bookings/{id}/status
#[instrument(skip(manager, admin), fields(admin = %admin.user_id))]
pub async fn update_booking_status(
    manager: web::Data<Arc<BookingManager>>,
    admin: AdminUser,
    path: web::Path<Uuid>,
    req: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let status = BookingStatus::from_str(&req.status)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown booking status '{}'", req.status)))?;

    let booking = manager.update_status(path.into_inner(), status).await?;

    info!(booking_id = %booking.id, status = %booking.status, "Booking status set by admin");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        BookingResponse::from(booking),
        "Booking status updated",
    )))
}

/// Attach a payment reference to a booking
///
/// POST /api/v1/admin/bookings/{id}/payment-reference
#[instrument(skip(manager, _admin))]
pub async fn assign_payment_reference(
    manager: web::Data<Arc<BookingManager>>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    req: web::Json<PaymentReferenceRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let booking = manager
        .assign_payment_reference(path.into_inner(), &req.reference_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

fn ensure_positive_rate(rate: Decimal) -> Result<(), AppError> {
    if rate <= Decimal::ZERO {
        return Err(AppError::Validation(
            "hourlyRate must be positive".to_string(),
        ));
    }
    Ok(())
}

/// List all bikes, listed or not
///
/// GET /api/v1/admin/bikes
#[instrument(skip(bikes, _admin))]
pub async fn list_bikes(
    bikes: web::Data<Arc<dyn BikeRepository>>,
    query: web::Query<PaginationParams>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let pagination = query.pagination();
    let items = bikes
        .find_all(pagination.limit(), pagination.offset())
        .await?;
    let total = bikes.count().await?;

    let data: Vec<BikeResponse> = items.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Add a bike to the catalog
///
/// POST /api/v1/admin/bikes
#[instrument(skip(bikes, _admin, req))]
pub async fn create_bike(
    bikes: web::Data<Arc<dyn BikeRepository>>,
    _admin: AdminUser,
    req: web::Json<CreateBikeRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Bike validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;
    ensure_positive_rate(req.hourly_rate)?;

    let created = bikes.create(&req.to_bike()).await?;
    info!(bike_id = %created.id, name = %created.name, "Bike created");

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        BikeResponse::from(created),
        "Bike created successfully",
    )))
}

/// Edit a bike
///
/// PUT /api/v1/admin/bikes/{id}
#[instrument(skip(bikes, _admin, req))]
pub async fn update_bike(
    bikes: web::Data<Arc<dyn BikeRepository>>,
    _admin: AdminUser,
    path: web::Path<Uuid>,
    req: web::Json<UpdateBikeRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    if let Some(rate) = req.hourly_rate {
        ensure_positive_rate(rate)?;
    }

    let id = path.into_inner();
    let mut bike = bikes
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::BikeNotFound(id.to_string()))?;

    req.apply(&mut bike);
    let updated = bikes.update(&bike).await?;
    info!(bike_id = %updated.id, "Bike updated");

    Ok(HttpResponse::Ok().json(ApiResponse::success(BikeResponse::from(updated))))
}

/// Configure admin routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/bookings", web::get().to(list_bookings))
            .route("/bookings/{id}/status", web::patch().to(update_booking_status))
            .route(
                "/bookings/{id}/payment-reference",
                web::post().to(assign_payment_reference),
            )
            .route("/bikes", web::get().to(list_bikes))
            .route("/bikes", web::post().to(create_bike))
            .route("/bikes/{id}", web::put().to(update_bike)),
    );
}
