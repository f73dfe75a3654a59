//! Variant axis repository.
//!
//! Variant axes are catalog configuration. The service reads them; the CLI
//! seeder creates them through [`VariantRepository::ensure`].

use std::collections::HashMap;

use sqlx::PgPool;

use catalog_core::VariantId;

use super::RepositoryError;
use crate::models::{Variant, VariantGroup};

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    title: String,
    description: Option<String>,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            title: row.title,
            description: row.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantValueRow {
    variant_id: i32,
    variant: String,
}

/// Repository for variant axes.
pub struct VariantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VariantRepository<'a> {
    /// Create a new variant repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every variant axis, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Variant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(
            "SELECT id, title, description FROM variants ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List every variant axis with the distinct tag values in use under it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_groups(&self) -> Result<Vec<VariantGroup>, RepositoryError> {
        let variants = self.list().await?;

        let value_rows = sqlx::query_as::<_, VariantValueRow>(
            r"
            SELECT DISTINCT variant_id, variant
            FROM product_variants
            ORDER BY variant_id ASC, variant ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let mut values: HashMap<i32, Vec<String>> = HashMap::new();
        for row in value_rows {
            values.entry(row.variant_id).or_default().push(row.variant);
        }

        Ok(variants
            .into_iter()
            .map(|variant| VariantGroup {
                values: values.remove(&variant.id.as_i32()).unwrap_or_default(),
                variant,
            })
            .collect())
    }

    /// Insert a variant axis unless one with the same title exists.
    ///
    /// # Returns
    ///
    /// Returns the axis, existing or newly created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn ensure(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Variant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            INSERT INTO variants (title, description)
            VALUES ($1, $2)
            ON CONFLICT (title) DO UPDATE SET title = EXCLUDED.title
            RETURNING id, title, description
            ",
        )
        .bind(title)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        Ok(row.into())
    }
}
