//! Request rate limiting for payment endpoints
//!
//! Handlers call [`enforce`] with the injected [`RateLimiter`]. The default
//! limiter is a per-process sliding log; multi-instance deployments inject
//! the Redis-backed one instead.

use actix_web::HttpRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use pedal_core::traits::{RateDecision, RateLimiter};
use pedal_core::{AppError, AppResult};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sliding log limiter held in process memory
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    log: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            log: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut log = self.log.lock();

        // Forget idle clients
        log.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });

        let hits = log.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() < self.max_requests as usize {
            hits.push_back(now);
            return RateDecision::allow(self.max_requests - hits.len() as u32);
        }

        let retry = hits
            .front()
            .map(|first| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*first))
                    .as_secs_f64()
                    .ceil() as u64
            })
            .unwrap_or(self.window.as_secs());
        RateDecision::deny(retry)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision, AppError> {
        Ok(self.check_at(key, Instant::now()))
    }
}

/// Client identity used as the limiter key
pub fn client_key(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Count the request and fail with `RateLimited` when over the limit
pub async fn enforce(limiter: &dyn RateLimiter, req: &HttpRequest) -> AppResult<()> {
    let key = client_key(req);
    let decision = limiter.check(&key).await?;

    if decision.allowed {
        debug!(client = %key, remaining = decision.remaining, "Rate limit check passed");
        Ok(())
    } else {
        warn!(client = %key, path = %req.path(), "Rate limit exceeded");
        Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        })
    }
}
