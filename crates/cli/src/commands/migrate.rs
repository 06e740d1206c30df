//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! nonito migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`

use nonito_storefront::db;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails.
pub async fn storefront() -> Result<(), MigrationError> {
    let database_url = super::database_url().map_err(|_| {
        MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL")
    })?;

    info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Storefront migrations complete!");
    Ok(())
}
