//! Repository implementations
//!
//! Concrete PostgreSQL implementations of the store traits defined in
//! pedal-core.

pub mod bike_repo;
pub mod booking_repo;

pub use bike_repo::PgBikeRepository;
pub use booking_repo::PgBookingRepository;
