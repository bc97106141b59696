//! Authentication and authorization for Pedal Rental
//!
//! Access tokens are issued by the external identity service and validated
//! here with a shared HMAC secret. Service-to-service calls use a static
//! internal token instead.
//!
//! # Features
//!
//! - JWT validation (and issuing, for tests and tooling)
//! - Request extractors for customers, staff and admins
//! - Internal caller extractor for trusted backends
//!
//! ## Using extractors in Actix-web
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use pedal_auth::middleware::{AdminUser, AuthenticatedUser};
//!
//! async fn my_bookings(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "userId": user.user_id }))
//! }
//!
//! async fn override_status(admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "by": admin.user_id }))
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{
    AdminUser, AuthenticatedUser, InternalAuth, InternalCaller, StaffUser, INTERNAL_TOKEN_HEADER,
};
