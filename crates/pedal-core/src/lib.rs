//! Pedal Rental Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Pedal Rental booking engine. It includes:
//!
//! - Domain models (Bike, Booking, payment outcomes)
//! - The booking status transition table
//! - Collaborator traits for stores, payment providers, and rate limiting
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
