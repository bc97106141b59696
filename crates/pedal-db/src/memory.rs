//! In-memory repositories
//!
//! Same contracts as the PostgreSQL repositories. The booking store performs
//! the overlap check and the insert under one write lock, which gives the
//! same exclusivity as the database constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pedal_core::{
    models::{Bike, Booking, BookingStatus, StatusPatch},
    traits::{BikeRepository, BookingRepository, Repository},
    AppError, AppResult,
};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// In-memory bike catalog
#[derive(Default)]
pub struct InMemoryBikeRepository {
    bikes: RwLock<HashMap<Uuid, Bike>>,
}

impl InMemoryBikeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog
    pub fn with_bikes(bikes: impl IntoIterator<Item = Bike>) -> Self {
        let map = bikes.into_iter().map(|b| (b.id, b)).collect();
        Self {
            bikes: RwLock::new(map),
        }
    }

    fn sorted(&self, listed_only: bool) -> Vec<Bike> {
        let mut bikes: Vec<Bike> = self
            .bikes
            .read()
            .values()
            .filter(|b| !listed_only || b.is_available)
            .cloned()
            .collect();
        bikes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        bikes
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Repository<Bike, Uuid> for InMemoryBikeRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Bike>> {
        Ok(self.bikes.read().get(&id).cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Bike>> {
        Ok(page(self.sorted(false), limit, offset))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.bikes.read().len() as i64)
    }

    async fn create(&self, entity: &Bike) -> AppResult<Bike> {
        let mut bikes = self.bikes.write();
        if bikes.contains_key(&entity.id) {
            return Err(AppError::Conflict(format!("Bike {} already exists", entity.id)));
        }
        bikes.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, entity: &Bike) -> AppResult<Bike> {
        let mut bikes = self.bikes.write();
        let slot = bikes
            .get_mut(&entity.id)
            .ok_or_else(|| AppError::BikeNotFound(entity.id.to_string()))?;
        *slot = Bike {
            updated_at: Utc::now(),
            ..entity.clone()
        };
        Ok(slot.clone())
    }
}

#[async_trait]
impl BikeRepository for InMemoryBikeRepository {
    async fn list_listed(&self, limit: i64, offset: i64) -> AppResult<(Vec<Bike>, i64)> {
        let listed = self.sorted(true);
        let total = listed.len() as i64;
        Ok((page(listed, limit, offset), total))
    }
}

/// In-memory booking store
#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings
    pub fn len(&self) -> usize {
        self.bookings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.read().is_empty()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create(&self, booking: &Booking) -> AppResult<Booking> {
        let mut bookings = self.bookings.write();

        let clash = bookings.values().any(|existing| {
            existing.bike_id == booking.bike_id
                && existing.conflicts_with(booking.start_time, booking.end_time)
        });
        if clash {
            debug!("Slot conflict for bike {}", booking.bike_id);
            return Err(AppError::SlotUnavailable);
        }
        if bookings.contains_key(&booking.id) {
            return Err(AppError::Conflict(format!(
                "Booking {} already exists",
                booking.id
            )));
        }

        bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.bookings.read().get(&id).cloned())
    }

    async fn find_blocking(
        &self,
        bike_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let mut blocking: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.bike_id == bike_id && b.conflicts_with(start, end))
            .cloned()
            .collect();
        blocking.sort_by_key(|b| b.start_time);
        Ok(blocking)
    }

    async fn list_by_bike(&self, bike_id: Uuid) -> AppResult<Vec<Booking>> {
        let mut list: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.bike_id == bike_id)
            .cloned()
            .collect();
        list.sort_by_key(|b| b.start_time);
        Ok(list)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        let mut list: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list(
        &self,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Booking>, i64)> {
        let mut list: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = list.len() as i64;
        Ok((page(list, limit, offset), total))
    }

    async fn set_payment_reference_if_unset(&self, id: Uuid, reference: &str) -> AppResult<bool> {
        let mut bookings = self.bookings.write();

        let taken = bookings
            .values()
            .any(|b| b.id != id && b.payment_reference_id.as_deref() == Some(reference));
        if taken {
            return Err(AppError::Conflict(format!(
                "Payment reference {} is already in use",
                reference
            )));
        }

        match bookings.get_mut(&id) {
            Some(booking) if booking.payment_reference_id.is_none() => {
                booking.payment_reference_id = Some(reference.to_string());
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &StatusPatch,
    ) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write();
        match bookings.get_mut(&id) {
            Some(booking) if booking.status == expected => {
                booking.apply(patch);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, patch: &StatusPatch) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write();

        let Some(current) = bookings.get(&id) else {
            return Ok(None);
        };

        // Reviving a cancelled booking must not collide with a live one
        if !current.status.blocks_slot() && patch.status.blocks_slot() {
            let (bike_id, start, end) = (current.bike_id, current.start_time, current.end_time);
            let clash = bookings
                .values()
                .any(|b| b.id != id && b.bike_id == bike_id && b.conflicts_with(start, end));
            if clash {
                return Err(AppError::SlotUnavailable);
            }
        }

        Ok(bookings.get_mut(&id).map(|booking| {
            booking.apply(patch);
            booking.clone()
        }))
    }
}
