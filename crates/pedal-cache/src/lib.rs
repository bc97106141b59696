//! Redis-backed shared state for Pedal Rental
//!
//! Provides a Redis connection wrapper and a sliding window rate limiter that
//! is shared by every API instance pointed at the same Redis.
//!
//! # Example
//!
//! ```no_run
//! use pedal_cache::{RedisCache, RedisRateLimiter};
//! use pedal_core::traits::RateLimiter;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!     let limiter = RedisRateLimiter::new(cache, "payments", 5, Duration::from_secs(60));
//!
//!     let decision = limiter.check("203.0.113.7").await?;
//!     println!("allowed: {}", decision.allowed);
//!     Ok(())
//! }
//! ```

pub mod keys;

use async_trait::async_trait;
use pedal_core::error::AppError;
use pedal_core::traits::{RateDecision, RateLimiter};
use redis::{aio::ConnectionManager, Client, RedisError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Redis connection wrapper
///
/// Wraps a ConnectionManager which multiplexes commands over one connection
/// and reconnects on failure.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheConnection` if the connection fails
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self { manager })
    }

    /// Ping the Redis server to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Convert RedisError to AppError
    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

/// Sliding log rate limiter stored in Redis sorted sets
///
/// Each request is a member scored by its arrival time in milliseconds.
/// Members older than the window are trimmed before counting.
pub struct RedisRateLimiter {
    cache: RedisCache,
    scope: String,
    max_requests: u32,
    window: Duration,
    sequence: AtomicU64,
}

impl RedisRateLimiter {
    pub fn new(cache: RedisCache, scope: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            cache,
            scope: scope.into(),
            max_requests,
            window,
            sequence: AtomicU64::new(0),
        }
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// Seconds until the oldest entry leaves the window, rounded up
fn retry_after_secs(oldest_ms: i64, window_ms: i64, now_ms: i64) -> u64 {
    let wait_ms = (oldest_ms + window_ms - now_ms).max(0) as u64;
    wait_ms.div_ceil(1000)
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, client: &str) -> Result<RateDecision, AppError> {
        let key = keys::rate_limit_key(&self.scope, client);
        let now_ms = Self::now_ms();
        let window_ms = self.window.as_millis() as i64;
        let member = format!(
            "{}-{}",
            now_ms,
            self.sequence.fetch_add(1, Ordering::Relaxed)
        );

        let mut conn = self.cache.connection();
        let (count, oldest): (u64, Vec<(String, f64)>) = redis::pipe()
            .atomic()
            .zrembyscore(&key, 0, now_ms - window_ms)
            .ignore()
            .zadd(&key, &member, now_ms)
            .ignore()
            .zcard(&key)
            .zrange_withscores(&key, 0, 0)
            .pexpire(&key, window_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(RedisCache::map_redis_error)?;

        if count <= u64::from(self.max_requests) {
            let remaining = self.max_requests - count as u32;
            return Ok(RateDecision::allow(remaining));
        }

        // Rejected requests do not occupy the window
        let _: () = redis::cmd("ZREM")
            .arg(&key)
            .arg(&member)
            .query_async(&mut conn)
            .await
            .map_err(RedisCache::map_redis_error)?;

        let oldest_ms = oldest
            .first()
            .map(|(_, score)| *score as i64)
            .unwrap_or(now_ms);
        let retry = retry_after_secs(oldest_ms, window_ms, now_ms);

        debug!(key = %key, count, retry, "Rate limit exceeded");
        Ok(RateDecision::deny(retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(1_000, 60_000, 1_000), 60);
        assert_eq!(retry_after_secs(1_000, 60_000, 1_001), 60);
        assert_eq!(retry_after_secs(1_000, 60_000, 60_500), 1);
        assert_eq!(retry_after_secs(1_000, 60_000, 90_000), 0);
    }

    async fn limiter(max: u32) -> RedisRateLimiter {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        let scope = format!("test-{}", RedisRateLimiter::now_ms());
        RedisRateLimiter::new(cache, scope, max, Duration::from_secs(60))
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_ping() {
        let cache = RedisCache::new("redis://127.0.0.1:6379").await.unwrap();
        assert!(cache.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_sixth_request_in_window_is_rejected() {
        let limiter = limiter(5).await;

        for expected_remaining in (0..5).rev() {
            let decision = limiter.check("198.51.100.1").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check("198.51.100.1").await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs >= 1);

        // Other clients have their own window
        assert!(limiter.check("198.51.100.2").await.unwrap().allowed);
    }
}
