//! JWT Claims structure

use chrono::{Duration, Utc};
use pedal_core::models::UserRole;
use serde::{Deserialize, Serialize};

/// JWT Claims
///
/// `sub` is the user id assigned by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// User role
    #[serde(default)]
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims; expiration is filled in by `JwtService`
    ///
    /// ```
    /// use pedal_auth::Claims;
    /// use pedal_core::models::UserRole;
    ///
    /// let claims = Claims::new("user-1", UserRole::Customer);
    /// assert_eq!(claims.sub, "user-1");
    /// ```
    pub fn new(user_id: &str, role: UserRole) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Create new claims with custom expiration duration
    pub fn with_expiration(user_id: &str, role: UserRole, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_with_expiration() {
        let claims = Claims::with_expiration("u1", UserRole::Admin, 3600);
        assert!(!claims.is_expired());

        let now = Utc::now().timestamp();
        assert!(claims.exp > now);
        assert!(claims.exp <= now + 3600);
    }

    #[test]
    fn test_expired_claims() {
        let mut claims = Claims::new("u1", UserRole::Customer);
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(claims.is_expired());
    }

    #[test]
    fn test_missing_role_defaults_to_customer() {
        let claims: Claims =
            serde_json::from_str(r#"{"sub":"u9","iat":1,"exp":2}"#).unwrap();
        assert_eq!(claims.role, UserRole::Customer);
        assert_eq!(claims.user_id(), "u9");
    }
}
