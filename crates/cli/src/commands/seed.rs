//! Seed the catalog with variant axes.
//!
//! Reads a YAML list of `{title, description}` entries and inserts every
//! axis that does not exist yet. Running it twice is harmless.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use catalog_web::db::{self, VariantRepository};

/// One variant axis in the seed file.
#[derive(Debug, Deserialize)]
pub struct VariantSeed {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Seed variant axes from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML seed file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database operation fails.
pub async fn variants(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading variant seeds from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seeds: Vec<VariantSeed> = serde_yaml::from_str(&content)?;

    let errors = validate(&seeds);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = VariantRepository::new(&pool);
    for seed in &seeds {
        let variant = repo
            .ensure(seed.title.trim(), seed.description.as_deref())
            .await?;
        info!(id = %variant.id, title = %variant.title, "Variant axis ready");
    }

    info!("Seeding complete! {} variant axes", seeds.len());
    Ok(())
}

/// Check seeds for blank or duplicate titles.
fn validate(seeds: &[VariantSeed]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, seed) in seeds.iter().enumerate() {
        let title = seed.title.trim();
        if title.is_empty() {
            errors.push(format!("entry {}: title is empty", i + 1));
        } else if !seen.insert(title.to_lowercase()) {
            errors.push(format!("entry {}: duplicate title {title:?}", i + 1));
        }
    }

    errors
}
