//! Pedal Rental Backend Server
//!
//! Booking engine for the bike rental shop: pricing, slot availability,
//! the booking lifecycle and payment reconciliation.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use pedal_api::{configure_api, InMemoryRateLimiter};
use pedal_auth::{InternalAuth, JwtService};
use pedal_cache::{RedisCache, RedisRateLimiter};
use pedal_core::config::{AppConfig, RateLimitBackend, RateLimitConfig};
use pedal_core::traits::{BikeRepository, BookingRepository, PaymentProvider, RateLimiter};
use pedal_core::AppError;
use pedal_db::{create_pool, run_migrations, PgBikeRepository, PgBookingRepository};
use pedal_services::{
    BookingManager, BookingSettings, GatewaySettings, HmacSignatureVerifier, HttpPaymentProvider,
    PaymentGateway, ProviderSettings,
};
use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// `LOG_FORMAT=json` switches to structured output for log shipping.
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pedal_rental={lvl},pedal_api={lvl},pedal_services={lvl},pedal_db={lvl},pedal_cache={lvl},pedal_auth={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(fmt::layer().json().with_current_span(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

fn startup_error(context: &str, err: AppError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

async fn build_rate_limiter(
    config: &RateLimitConfig,
    redis_url: &str,
) -> Result<Arc<dyn RateLimiter>, AppError> {
    let window = Duration::from_secs(config.window_secs);

    match config.backend {
        RateLimitBackend::Memory => {
            info!(
                max_requests = config.max_requests,
                window_secs = config.window_secs,
                "Using in-process rate limiter"
            );
            Ok(Arc::new(InMemoryRateLimiter::new(config.max_requests, window)))
        }
        RateLimitBackend::Redis => {
            let cache = RedisCache::new(redis_url).await?;
            info!(
                max_requests = config.max_requests,
                window_secs = config.window_secs,
                "Using Redis rate limiter"
            );
            Ok(Arc::new(RedisRateLimiter::new(
                cache,
                "payments",
                config.max_requests,
                window,
            )))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Pedal Rental backend v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e.into()))?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .map_err(|e| startup_error("Failed to create database pool", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    // Stores
    let bikes: Arc<dyn BikeRepository> = Arc::new(PgBikeRepository::new(pool.clone()));
    let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(pool));

    // Booking lifecycle
    let settings = BookingSettings::from_config(&config.payment)
        .map_err(|e| startup_error("Invalid payment settings", e))?;
    info!(
        deposit = %settings.deposit,
        paid_status = %settings.paid_status,
        "Booking settings loaded"
    );
    let manager = Arc::new(BookingManager::new(bikes.clone(), bookings, settings));

    // Payment reconciliation
    let provider: Arc<dyn PaymentProvider> = Arc::new(
        HttpPaymentProvider::new(ProviderSettings::from_config(&config.payment))
            .map_err(|e| startup_error("Failed to build payment provider", e))?,
    );
    if config.payment.webhook_secret.is_empty() {
        warn!("Webhook secret is empty, every provider webhook will be rejected");
    }
    let gateway = Arc::new(PaymentGateway::new(
        manager.clone(),
        provider,
        Arc::new(HmacSignatureVerifier),
        GatewaySettings::from_config(&config.payment),
    ));

    let limiter = build_rate_limiter(&config.rate_limit, &config.redis.url)
        .await
        .map_err(|e| startup_error("Failed to build rate limiter", e))?;

    // Auth
    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));
    let internal_auth = InternalAuth::new(config.payment.internal_token.clone());

    info!(
        "JWT service configured with {} second token expiration",
        config.auth.jwt_expiration_secs
    );

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(manager.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(bikes.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(internal_auth.clone()))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_api)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
