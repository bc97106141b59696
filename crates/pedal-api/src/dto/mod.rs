//! Data Transfer Objects (DTOs) for API requests and responses

pub mod bike;
pub mod booking;
pub mod common;
pub mod payment;

pub use bike::*;
pub use booking::*;
pub use common::*;
pub use payment::*;
