//! Bike catalog model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rentable bike
///
/// `is_available` is the listing flag controlled by staff. It is independent
/// of whether a particular time slot is free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bike {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Bike category (e.g. "city", "mountain", "electric")
    #[serde(rename = "type")]
    pub bike_type: String,

    /// Free-form description
    pub description: Option<String>,

    /// Price per hour in major currency units
    pub hourly_rate: Decimal,

    /// Listing flag
    pub is_available: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Bike {
    /// Create a new listed bike
    pub fn new(name: impl Into<String>, bike_type: impl Into<String>, hourly_rate: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            bike_type: bike_type.into(),
            description: None,
            hourly_rate,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// A bike can only be priced when its rate is positive
    pub fn has_valid_rate(&self) -> bool {
        self.hourly_rate > Decimal::ZERO
    }
}

impl Default for Bike {
    fn default() -> Self {
        Self::new("", "city", Decimal::ZERO)
    }
}
