//! Bearer token verification
//!
//! Tokens are minted by the identity service with a shared HS256 secret.
//! This service only needs to verify them; `create_token` exists for tooling and
//! tests.

use crate::claims::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use pedal_core::error::AppError;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct JwtService {
    /// Lifetime given to tokens issued without an explicit `exp`
    expiration_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// ```
    /// use pedal_auth::JwtService;
    ///
    /// let jwt = JwtService::new("shared-secret", 1800);
    /// assert_eq!(jwt.expiration_secs(), 1800);
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        // Expiry is checked to the second
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            expiration_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign `claims`, filling in `exp` when it is unset
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut claims = claims.clone();
        if claims.exp == 0 {
            claims.exp = (Utc::now() + Duration::seconds(self.expiration_secs)).timestamp();
        }

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign token");
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    /// Verify signature and expiry and return the claims
    ///
    /// # Errors
    ///
    /// - `AppError::TokenExpired` once `exp` has passed
    /// - `AppError::InvalidToken` for anything else
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("Rejected expired token");
                    AppError::TokenExpired
                }
                _ => {
                    warn!(error = %e, "Rejected invalid token");
                    AppError::InvalidToken(e.to_string())
                }
            })?;

        debug!(user_id = %claims.sub, role = %claims.role, "Token accepted");
        Ok(claims)
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedal_core::models::UserRole;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-12345";

    #[test]
    fn test_issued_token_round_trips_claims() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let token = jwt_service
            .create_token(&Claims::new("rider-1", UserRole::Customer))
            .unwrap();

        let decoded = jwt_service.validate_token(&token).unwrap();
        assert_eq!(decoded.sub, "rider-1");
        assert_eq!(decoded.role, UserRole::Customer);
        assert!(decoded.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 1);
        let claims = Claims::with_expiration("rider-1", UserRole::Customer, -120);
        let token = jwt_service.create_token(&claims).unwrap();

        let result = jwt_service.validate_token(&token);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let result = jwt_service.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_token_with_different_secret() {
        let issuer = JwtService::new("secret1", 3600);
        let verifier = JwtService::new("secret2", 3600);

        let token = issuer
            .create_token(&Claims::new("rider-1", UserRole::Admin))
            .unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_explicit_expiry_is_kept() {
        let jwt = JwtService::new(TEST_SECRET, 60);
        let claims = Claims::with_expiration("staff-7", UserRole::Staff, 7200);
        let token = jwt.create_token(&claims).unwrap();

        assert_eq!(jwt.validate_token(&token).unwrap().exp, claims.exp);
    }

    #[test]
    fn test_debug_hides_secret() {
        let printed = format!("{:?}", JwtService::new(TEST_SECRET, 3600));
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains(TEST_SECRET));
    }
}
