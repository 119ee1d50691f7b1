use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the process-wide connection pool. The pool itself is handed to the
/// router as state; nothing here keeps a global copy.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect eagerly, failing fast when the database is unreachable.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let redacted = Self::redacted_url(&config.url)?;
        let pool = Self::pool_options(config).connect(&config.url).await?;
        info!("Created database pool for: {}", redacted);
        Ok(pool)
    }

    /// Build a pool that opens connections on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        Self::redacted_url(&config.url)?;
        Ok(Self::pool_options(config).connect_lazy(&config.url)?)
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Connection URL with the password masked, safe for log output.
    pub fn redacted_url(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("***"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
