//! Payment handlers
//!
//! Entry points for every payment channel. All of them delegate to
//! [`PaymentGateway`], which funnels outcomes into the booking lifecycle.

use crate::dto::{
    ApiResponse, BookingResponse, CallbackParams, InitiatePaymentRequest, PaymentUpdateResponse,
};
use crate::rate_limit;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use pedal_auth::{AuthenticatedUser, InternalCaller};
use pedal_core::traits::RateLimiter;
use pedal_core::AppError;
use pedal_services::reconciliation::InternalUpdate;
use pedal_services::{BookingManager, CallbackResult, CallbackStatus, PaymentGateway};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "X-VERIFY";

/// Start a deposit payment
///
/// POST /api/v1/payments/initiate
#[instrument(skip_all)]
pub async fn initiate_payment(
    http: HttpRequest,
    gateway: web::Data<Arc<PaymentGateway>>,
    manager: web::Data<Arc<BookingManager>>,
    limiter: web::Data<Arc<dyn RateLimiter>>,
    user: AuthenticatedUser,
    req: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, AppError> {
    rate_limit::enforce(limiter.get_ref().as_ref(), &http).await?;

    let booking = manager.get(req.booking_id).await?;
    if !user.can_access(&booking.user_id) {
        warn!(booking_id = %booking.id, user_id = %user.user_id, "Payment for foreign booking");
        return Err(AppError::Forbidden);
    }

    let started = gateway.initiate_payment(booking.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(started)))
}

/// Provider webhook
///
/// POST /api/v1/payments/webhook
///
/// 400 only for a bad signature or an undecodable body; everything else is
/// acknowledged.
#[instrument(skip_all)]
pub async fn payment_webhook(
    http: HttpRequest,
    gateway: web::Data<Arc<PaymentGateway>>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = http
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let ack = gateway.handle_webhook(&body, signature).await?;
    Ok(HttpResponse::Ok().json(ack))
}

fn redirect(gateway: &PaymentGateway, result: &CallbackResult) -> HttpResponse {
    let location = gateway.redirect_location(result);
    info!(status = %result.status, location = %location, "Redirecting to payment result");
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

async fn resolve_callback(gateway: &PaymentGateway, params: CallbackParams) -> HttpResponse {
    let result = match params.transaction_id.as_deref().map(str::trim) {
        Some(txn) if !txn.is_empty() => gateway.handle_callback(txn).await,
        _ => {
            warn!("Payment callback without transaction id");
            CallbackResult {
                status: CallbackStatus::Error,
                booking_id: None,
            }
        }
    };
    redirect(gateway, &result)
}

/// Redirect callback via query string
///
/// GET /api/v1/payments/callback
#[instrument(skip(gateway))]
pub async fn payment_callback_get(
    gateway: web::Data<Arc<PaymentGateway>>,
    query: web::Query<CallbackParams>,
) -> HttpResponse {
    resolve_callback(&gateway, query.into_inner()).await
}

/// Redirect callback via form post
///
/// POST /api/v1/payments/callback
#[instrument(skip(gateway))]
pub async fn payment_callback_post(
    gateway: web::Data<Arc<PaymentGateway>>,
    form: web::Form<CallbackParams>,
) -> HttpResponse {
    resolve_callback(&gateway, form.into_inner()).await
}

/// Trusted payment status update
///
/// POST /api/v1/payments/update-status
#[instrument(skip_all)]
pub async fn update_payment_status(
    http: HttpRequest,
    gateway: web::Data<Arc<PaymentGateway>>,
    limiter: web::Data<Arc<dyn RateLimiter>>,
    _caller: InternalCaller,
    req: web::Json<InternalUpdate>,
) -> Result<HttpResponse, AppError> {
    rate_limit::enforce(limiter.get_ref().as_ref(), &http).await?;

    let booking = gateway.apply_internal_update(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PaymentUpdateResponse {
        success: true,
        booking: BookingResponse::from(booking),
    }))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/initiate", web::post().to(initiate_payment))
            .route("/webhook", web::post().to(payment_webhook))
            .route("/callback", web::get().to(payment_callback_get))
            .route("/callback", web::post().to(payment_callback_post))
            .route("/update-status", web::post().to(update_payment_status)),
    );
}
