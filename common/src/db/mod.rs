use std::path::Path;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool, Pool, Postgres};
use tracing::info;

use crate::error::{Error, Result};

pub mod models;

pub use models::{DbCard, DbUser};

/// Database pool type
pub type DbPool = Pool<Postgres>;

/// Initialize the database connection pool
pub async fn init_db_pool(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run migrations on the database
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or_else(|| Error::ConfigurationError("workspace root not found".to_string()))?
        .join("migrations");
    info!("Running database migrations from {}", migrations_path.display());

    sqlx::migrate::Migrator::new(migrations_path)
        .await?
        .run(pool)
        .await?;

    Ok(())
}
