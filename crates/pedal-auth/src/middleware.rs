//! Actix-web request extractors
//!
//! Role checks happen at extraction time, so a handler that takes an
//! `AdminUser` never runs for anyone else.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use pedal_core::error::AppError;
use pedal_core::models::UserRole;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Header carrying the shared token on internal calls
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// Extract JWT token from request
///
/// Checks the `Authorization: Bearer` header first, then a `token` cookie.
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Some(token) = auth_header
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
        {
            return Some(token.trim().to_string());
        }
    }

    req.cookie("token").map(|c| c.value().to_string())
}

fn reject(err: AppError) -> Ready<Result<AuthenticatedUser, actix_web::Error>> {
    ready(Err(err.into()))
}

/// Authenticated user extractor
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User id from the identity service
    pub user_id: String,

    pub role: UserRole,

    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Customers may only act on their own resources
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_staff() || self.user_id == owner_id
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(jwt_service) = req.app_data::<web::Data<Arc<JwtService>>>() else {
            warn!("JwtService not found in app data");
            return reject(AppError::Unauthorized(
                "Authentication service not configured".to_string(),
            ));
        };

        let Some(token) = extract_token_from_request(req) else {
            debug!("No authentication token found in request");
            return reject(AppError::Unauthorized(
                "No authentication token provided".to_string(),
            ));
        };

        match jwt_service.validate_token(&token) {
            Ok(claims) => {
                debug!(user_id = %claims.sub, role = %claims.role, "User authenticated");
                ready(Ok(AuthenticatedUser {
                    user_id: claims.sub.clone(),
                    role: claims.role,
                    claims,
                }))
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                reject(e)
            }
        }
    }
}

/// Staff user extractor (staff or admin)
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthenticatedUser);

impl std::ops::Deref for StaffUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for StaffUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let user = match AuthenticatedUser::from_request(req, payload).into_inner() {
            Ok(user) => user,
            Err(e) => return ready(Err(e)),
        };

        if !user.is_staff() {
            warn!(user_id = %user.user_id, role = %user.role, "Staff access denied");
            return ready(Err(AppError::Forbidden.into()));
        }

        ready(Ok(StaffUser(user)))
    }
}

/// Admin user extractor
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let user = match AuthenticatedUser::from_request(req, payload).into_inner() {
            Ok(user) => user,
            Err(e) => return ready(Err(e)),
        };

        if !user.is_admin() {
            warn!(
                user_id = %user.user_id,
                role = %user.role,
                "User attempted admin access without privileges"
            );
            return ready(Err(AppError::Forbidden.into()));
        }

        debug!(user_id = %user.user_id, "Admin access granted");
        ready(Ok(AdminUser(user)))
    }
}

/// Shared secret for trusted backend callers
#[derive(Clone)]
pub struct InternalAuth {
    token: String,
}

impl InternalAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Constant-time comparison; an empty configured token matches nothing
    pub fn verify(&self, presented: &str) -> bool {
        !self.token.is_empty() && bool::from(self.token.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl std::fmt::Debug for InternalAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalAuth")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Extractor for requests carrying a valid `X-Internal-Token`
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequest for InternalCaller {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(auth) = req.app_data::<web::Data<InternalAuth>>() else {
            warn!("InternalAuth not found in app data");
            return ready(Err(AppError::Unauthorized(
                "Internal authentication not configured".to_string(),
            )
            .into()));
        };

        let presented = req
            .headers()
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if auth.verify(presented) {
            ready(Ok(InternalCaller))
        } else {
            warn!("Rejected internal call with bad token");
            ready(Err(AppError::Unauthorized("Invalid internal token".to_string()).into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App, HttpResponse};

    fn create_test_jwt_service() -> Arc<JwtService> {
        Arc::new(JwtService::new("test-secret-key-12345", 3600))
    }

    fn token_for(jwt: &JwtService, role: UserRole) -> String {
        jwt.create_token(&Claims::new("user-1", role)).unwrap()
    }

    #[actix_web::test]
    async fn test_extract_token_from_authorization_header() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, UserRole::Customer);

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.user_id, "user-1");
                HttpResponse::Ok().finish()
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_missing_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(create_test_jwt_service()))
                .route(
                    "/test",
                    web::get().to(|_user: AuthenticatedUser| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_admin_extractor_rejects_staff_with_403() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, UserRole::Staff);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt_service))
                .route(
                    "/admin",
                    web::get().to(|_admin: AdminUser| async { HttpResponse::Ok().finish() }),
                )
                .route(
                    "/staff",
                    web::get().to(|_staff: StaffUser| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::get()
            .uri("/staff")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    #[actix_web::test]
    async fn test_admin_extractor_accepts_admin() {
        let jwt_service = create_test_jwt_service();
        let token = token_for(&jwt_service, UserRole::Admin);

        let app = test::init_service(App::new().app_data(web::Data::new(jwt_service)).route(
            "/admin",
            web::get().to(|admin: AdminUser| async move {
                assert!(admin.is_admin());
                HttpResponse::Ok().finish()
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    #[actix_web::test]
    async fn test_internal_caller_requires_matching_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(InternalAuth::new("s3cret")))
                .route(
                    "/internal",
                    web::post().to(|_caller: InternalCaller| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/internal")
            .insert_header((INTERNAL_TOKEN_HEADER, "s3cret"))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::post()
            .uri("/internal")
            .insert_header((INTERNAL_TOKEN_HEADER, "guess"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        let req = test::TestRequest::post().uri("/internal").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }

    #[::core::prelude::v1::test]
    fn test_empty_internal_token_matches_nothing() {
        assert!(!InternalAuth::new("").verify(""));
        assert!(InternalAuth::new("abc").verify("abc"));
        assert!(!InternalAuth::new("abc").verify("abcd"));
    }

    #[::core::prelude::v1::test]
    fn test_customer_can_only_access_own_resources() {
        let claims = Claims::new("user-1", UserRole::Customer);
        let user = AuthenticatedUser {
            user_id: claims.sub.clone(),
            role: claims.role,
            claims,
        };
        assert!(user.can_access("user-1"));
        assert!(!user.can_access("user-2"));
    }
}
