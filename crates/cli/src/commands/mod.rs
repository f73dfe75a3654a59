//! CLI command implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Read the catalog database URL, loading `.env` first.
///
/// # Errors
///
/// Returns an error if neither `CATALOG_DATABASE_URL` nor `DATABASE_URL` is set.
pub fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();

    std::env::var("CATALOG_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "CATALOG_DATABASE_URL not set")
}
