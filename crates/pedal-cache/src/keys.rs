//! Cache key builders
//!
//! # Key Patterns
//!
//! - `ratelimit:{scope}:{client}` - Sorted set of request timestamps (ms)

/// Prefix for rate limit windows
pub const RATE_LIMIT_PREFIX: &str = "ratelimit";

/// Build the sliding window key for a client within a scope
///
/// # Example
///
/// ```
/// use pedal_cache::keys::rate_limit_key;
///
/// assert_eq!(rate_limit_key("payments", "10.0.0.1"), "ratelimit:payments:10.0.0.1");
/// ```
pub fn rate_limit_key(scope: &str, client: &str) -> String {
    format!("{}:{}:{}", RATE_LIMIT_PREFIX, scope, client)
}
