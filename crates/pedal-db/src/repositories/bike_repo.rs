//! Bike repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pedal_core::{
    models::Bike,
    traits::{BikeRepository, Repository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of BikeRepository
pub struct PgBikeRepository {
    pool: PgPool,
}

impl PgBikeRepository {
    /// Create a new bike repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Bike, Uuid> for PgBikeRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Bike>> {
        debug!("Finding bike by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, BikeRow>(
            r#"
            SELECT id, name, bike_type, description, hourly_rate,
                   is_available, created_at, updated_at
            FROM bikes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding bike {}: {}", id, e);
            AppError::Database(format!("Failed to find bike: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Bike>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BikeRow>(
            r#"
            SELECT id, name, bike_type, description, hourly_rate,
                   is_available, created_at, updated_at
            FROM bikes
            ORDER BY name, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing bikes: {}", e);
            AppError::Database(format!("Failed to fetch bikes: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bikes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting bikes: {}", e);
                AppError::Database(format!("Failed to count bikes: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &Bike) -> AppResult<Bike> {
        debug!("Creating bike: {}", entity.name);

        let row = sqlx::query_as::<sqlx::Postgres, BikeRow>(
            r#"
            INSERT INTO bikes (id, name, bike_type, description, hourly_rate, is_available)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, bike_type, description, hourly_rate,
                      is_available, created_at, updated_at
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.bike_type)
        .bind(&entity.description)
        .bind(entity.hourly_rate)
        .bind(entity.is_available)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating bike: {}", e);
            AppError::Database(format!("Failed to create bike: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity))]
    async fn update(&self, entity: &Bike) -> AppResult<Bike> {
        debug!("Updating bike: {}", entity.id);

        let row = sqlx::query_as::<sqlx::Postgres, BikeRow>(
            r#"
            UPDATE bikes
            SET name = $2,
                bike_type = $3,
                description = $4,
                hourly_rate = $5,
                is_available = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, bike_type, description, hourly_rate,
                      is_available, created_at, updated_at
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.bike_type)
        .bind(&entity.description)
        .bind(entity.hourly_rate)
        .bind(entity.is_available)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating bike {}: {}", entity.id, e);
            AppError::Database(format!("Failed to update bike: {}", e))
        })?
        .ok_or_else(|| AppError::BikeNotFound(entity.id.to_string()))?;

        Ok(row.into())
    }
}

#[async_trait]
impl BikeRepository for PgBikeRepository {
    #[instrument(skip(self))]
    async fn list_listed(&self, limit: i64, offset: i64) -> AppResult<(Vec<Bike>, i64)> {
        let rows = sqlx::query_as::<sqlx::Postgres, BikeRow>(
            r#"
            SELECT id, name, bike_type, description, hourly_rate,
                   is_available, created_at, updated_at
            FROM bikes
            WHERE is_available
            ORDER BY name, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing listed bikes: {}", e);
            AppError::Database(format!("Failed to fetch bikes: {}", e))
        })?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bikes WHERE is_available")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting listed bikes: {}", e);
                AppError::Database(format!("Failed to count bikes: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BikeRow {
    id: Uuid,
    name: String,
    bike_type: String,
    description: Option<String>,
    hourly_rate: Decimal,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BikeRow> for Bike {
    fn from(row: BikeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            bike_type: row.bike_type,
            description: row.description,
            hourly_rate: row.hourly_rate,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
