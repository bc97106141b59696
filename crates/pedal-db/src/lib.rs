//! Pedal Rental Database Layer
//!
//! This crate provides booking and bike persistence. It includes:
//!
//! - Connection pool management and migrations with sqlx
//! - PostgreSQL repositories, with slot exclusivity enforced by an
//!   exclusion constraint
//! - In-memory repositories with the same contracts, used by tests and
//!   local runs without a database

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::{InMemoryBikeRepository, InMemoryBookingRepository};
pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use pedal_core::{AppError, AppResult};
pub use sqlx::PgPool;
