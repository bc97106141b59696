//! Connection pool and schema migrations

use pedal_core::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Upper bound on waiting for a pooled connection. Every store call inherits it.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Open the pool and make sure the database answers
///
/// ```no_run
/// # async fn run() -> pedal_core::AppResult<()> {
/// let pool = pedal_db::create_pool("postgresql://localhost/pedal", Some(4)).await?;
/// pedal_db::run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_pool(database_url: &str, max_connections: Option<u32>) -> AppResult<PgPool> {
    let max_connections = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| {
            error!(error = %e, "Could not connect to database");
            AppError::Pool(format!("Failed to connect to database: {}", e))
        })?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| AppError::Database(format!("Database did not answer: {}", e)))?;

    info!(max_connections, "Database pool ready");
    Ok(pool)
}

/// Apply the migrations under `migrations/`, including the overlap constraint
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Migration failed");
            AppError::Database(format!("Migration failed: {}", e))
        })?;

    info!("Database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_create_pool_and_migrate() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/pedal".to_string());

        let pool = create_pool(&database_url, Some(2)).await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }
}
