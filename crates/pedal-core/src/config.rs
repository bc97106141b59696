//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use crate::models::BookingStatus;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Redis configuration
///
/// Only used when the rate limiter runs with the shared `redis` backend.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret shared with the identity service
    pub jwt_secret: String,

    /// JWT token expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    1800
}

/// Payment gateway and reconciliation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Merchant identifier issued by the provider
    pub merchant_id: String,

    /// Salt key used to sign provider API requests
    pub salt_key: String,

    /// Index of the salt key on the provider side
    #[serde(default = "default_salt_index")]
    pub salt_index: u32,

    /// Provider API base URL
    pub provider_base_url: String,

    /// Shared secret for webhook message authentication
    pub webhook_secret: String,

    /// URL the provider redirects the customer back to
    pub redirect_url: String,

    /// URL the provider posts asynchronous notifications to
    pub webhook_url: String,

    /// Frontend page that renders the payment outcome
    pub frontend_result_url: String,

    /// Prefix of merchant transaction ids (`<prefix>_<bookingId>_<timestamp>`)
    #[serde(default = "default_txn_prefix")]
    pub merchant_txn_prefix: String,

    /// Flat booking-hold deposit in major currency units
    #[serde(default = "default_deposit_amount")]
    pub deposit_amount: f64,

    /// Status a successful payment moves a booking into
    #[serde(default = "default_paid_status")]
    pub paid_status: String,

    /// Delay before the single retry of a failed store write
    #[serde(default = "default_store_retry_delay")]
    pub store_retry_delay_ms: u64,

    /// Shared token required on the internal payment update endpoint
    pub internal_token: String,

    /// Provider request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
}

fn default_salt_index() -> u32 {
    1
}

fn default_txn_prefix() -> String {
    "PEDAL".to_string()
}

fn default_deposit_amount() -> f64 {
    42.0
}

fn default_paid_status() -> String {
    "deposit_paid".to_string()
}

fn default_store_retry_delay() -> u64 {
    250
}

fn default_provider_timeout() -> u64 {
    15
}

impl PaymentConfig {
    /// Deposit as a decimal amount rounded to two places
    pub fn deposit(&self) -> Result<Decimal, ConfigError> {
        if !self.deposit_amount.is_finite() || self.deposit_amount < 0.0 {
            return Err(ConfigError::Message(format!(
                "payment.deposit_amount must be a finite non-negative amount, got {}",
                self.deposit_amount
            )));
        }
        Decimal::try_from(self.deposit_amount)
            .map(|d| d.round_dp(2))
            .map_err(|e| ConfigError::Message(format!("payment.deposit_amount: {}", e)))
    }

    /// Parse the configured paid status
    ///
    /// Only `deposit_paid` and `fully_paid` are meaningful payment targets.
    pub fn paid_status(&self) -> Result<BookingStatus, ConfigError> {
        match BookingStatus::from_str(&self.paid_status) {
            Some(status @ (BookingStatus::DepositPaid | BookingStatus::FullyPaid)) => Ok(status),
            _ => Err(ConfigError::Message(format!(
                "payment.paid_status must be deposit_paid or fully_paid, got '{}'",
                self.paid_status
            ))),
        }
    }
}

impl PaymentConfig {
    /// Reject settings that would break payment processing at runtime
    ///
    /// The transaction prefix is the first `_`-separated segment of every
    /// merchant transaction id, so it must be non-empty and free of `_`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.paid_status()?;

        let prefix = self.merchant_txn_prefix.trim();
        if prefix.is_empty() || prefix.contains('_') {
            return Err(ConfigError::Message(format!(
                "payment.merchant_txn_prefix must be non-empty and must not contain '_', got '{}'",
                self.merchant_txn_prefix
            )));
        }

        self.deposit()?;
        Ok(())
    }
}

/// Rate limiting backend
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// Per-process sliding window
    #[default]
    Memory,
    /// Shared sliding window in Redis
    Redis,
}

/// Sliding window rate limit for payment endpoints
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,

    #[serde(default)]
    pub backend: RateLimitBackend,
}

fn default_rate_limit_max() -> u32 {
    5
}

fn default_rate_limit_window() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
            backend: RateLimitBackend::Memory,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_expiration_secs", 1800)?
            .set_default("payment.salt_index", 1)?
            .set_default("payment.merchant_txn_prefix", "PEDAL")?
            .set_default("payment.deposit_amount", 42.0)?
            .set_default("payment.paid_status", "deposit_paid")?
            .set_default("payment.store_retry_delay_ms", 250)?
            .set_default("payment.provider_timeout_secs", 15)?
            .set_default("rate_limit.max_requests", 5)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.backend", "memory")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with PEDAL_ prefix
            .add_source(
                Environment::with_prefix("PEDAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.payment.validate()?;
        Ok(app)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PEDAL").separator("__"))
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.payment.validate()?;
        Ok(app)
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
