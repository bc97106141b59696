//! Bike catalog DTOs

use super::common::money;
use chrono::{DateTime, Utc};
use pedal_core::models::Bike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Bike creation request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBikeRequest {
    #[validate(length(min = 1, max = 100, message = "Bike name is required"))]
    pub name: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub bike_type: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub hourly_rate: Decimal,

    #[serde(default = "default_listed")]
    pub is_available: bool,
}

fn default_listed() -> bool {
    true
}

impl CreateBikeRequest {
    /// Convert to Bike entity
    pub fn to_bike(&self) -> Bike {
        let mut bike = Bike::new(self.name.trim(), self.bike_type.trim(), self.hourly_rate);
        bike.description = self.description.clone();
        bike.is_available = self.is_available;
        bike
    }
}

/// Bike update request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBikeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub bike_type: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub hourly_rate: Option<Decimal>,

    pub is_available: Option<bool>,
}

impl UpdateBikeRequest {
    /// Apply the present fields onto `bike`
    pub fn apply(&self, bike: &mut Bike) {
        if let Some(name) = &self.name {
            bike.name = name.trim().to_string();
        }
        if let Some(bike_type) = &self.bike_type {
            bike.bike_type = bike_type.trim().to_string();
        }
        if let Some(description) = &self.description {
            bike.description = Some(description.clone());
        }
        if let Some(rate) = self.hourly_rate {
            bike.hourly_rate = rate;
        }
        if let Some(listed) = self.is_available {
            bike.is_available = listed;
        }
        bike.updated_at = Utc::now();
    }
}

/// Bike response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub bike_type: String,
    pub description: Option<String>,
    pub hourly_rate: f64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Bike> for BikeResponse {
    fn from(b: Bike) -> Self {
        Self {
            id: b.id,
            name: b.name,
            bike_type: b.bike_type,
            description: b.description,
            hourly_rate: money(b.hourly_rate),
            is_available: b.is_available,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_request_defaults_to_listed() {
        let req: CreateBikeRequest =
            serde_json::from_str(r#"{"name":"Trail","type":"mountain","hourlyRate":80}"#).unwrap();
        let bike = req.to_bike();
        assert!(bike.is_available);
        assert_eq!(bike.hourly_rate, dec!(80));
        assert_eq!(bike.bike_type, "mountain");
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut bike = Bike::new("Roadster", "city", dec!(50));
        let update: UpdateBikeRequest =
            serde_json::from_str(r#"{"hourlyRate":"55.5","isAvailable":false}"#).unwrap();
        update.apply(&mut bike);

        assert_eq!(bike.name, "Roadster");
        assert_eq!(bike.hourly_rate, dec!(55.5));
        assert!(!bike.is_available);
    }

    #[test]
    fn test_empty_name_fails_validation() {
        let req: CreateBikeRequest =
            serde_json::from_str(r#"{"name":"","type":"city","hourlyRate":10}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
