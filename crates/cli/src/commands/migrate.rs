//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! catalog-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Catalog migrations live in `crates/web/migrations/` and are embedded in
//! the binary at build time.

use tracing::info;

use catalog_web::db;

/// Errors from running migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run catalog database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = super::database_url()
        .map_err(|_| MigrationError::MissingEnvVar("CATALOG_DATABASE_URL"))?;

    info!("Connecting to catalog database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running catalog migrations...");
    sqlx::migrate!("../web/migrations").run(&pool).await?;

    info!("Catalog migrations complete!");
    Ok(())
}
