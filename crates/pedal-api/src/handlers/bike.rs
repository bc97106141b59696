//! Public bike catalog handlers

use crate::dto::{ApiResponse, BikeResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use pedal_core::traits::BikeRepository;
use pedal_core::AppError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// List bikes open for rental
///
/// GET /api/v1/bikes
#[instrument(skip(bikes))]
pub async fn list_bikes(
    bikes: web::Data<Arc<dyn BikeRepository>>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;

    let pagination = query.pagination();
    let (items, total) = bikes
        .list_listed(pagination.limit(), pagination.offset())
        .await?;

    let data: Vec<BikeResponse> = items.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Get a single bike
///
/// GET /api/v1/bikes/{id}
#[instrument(skip(bikes))]
pub async fn get_bike(
    bikes: web::Data<Arc<dyn BikeRepository>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let bike = bikes
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::BikeNotFound(id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BikeResponse::from(bike))))
}

/// Configure public bike routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bikes")
            .route("", web::get().to(list_bikes))
            .route("/{id}", web::get().to(get_bike)),
    );
}
