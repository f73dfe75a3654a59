//! Product repository for database operations.
//!
//! Reads go through [`ProductRepository`]. Every write goes through a
//! [`CatalogWriter`], which owns one transaction: dropping it without
//! calling [`CatalogWriter::commit`] rolls the transaction back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use catalog_core::{
    ProductId, ProductImageId, ProductVariantId, ProductVariantPriceId, VariantId,
};

use super::RepositoryError;
use crate::models::{
    NewProductVariant, NewProductVariantPrice, Product, ProductAttributes, ProductFilter,
    ProductImage, ProductPage, ProductVariant, ProductVariantPrice, ProductWithDetails,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    sku: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            title: row.title,
            sku: row.sku,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductVariantRow {
    id: i32,
    product_id: i32,
    variant_id: i32,
    variant: String,
}

impl From<ProductVariantRow> for ProductVariant {
    fn from(row: ProductVariantRow) -> Self {
        Self {
            id: ProductVariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            variant_id: VariantId::new(row.variant_id),
            variant: row.variant,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductVariantPriceRow {
    id: i32,
    product_id: i32,
    price: Decimal,
    stock: i32,
}

impl From<ProductVariantPriceRow> for ProductVariantPrice {
    fn from(row: ProductVariantPriceRow) -> Self {
        Self {
            id: ProductVariantPriceId::new(row.id),
            product_id: ProductId::new(row.product_id),
            price: row.price,
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: i32,
    product_id: i32,
    file_path: String,
}

impl From<ProductImageRow> for ProductImage {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            file_path: row.file_path,
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Shared WHERE clause for listing and counting.
///
/// `$1` escaped title pattern, `$2`/`$3` creation bounds, `$4` variant axis,
/// `$5`/`$6` price bounds.
macro_rules! product_filter_clause {
    () => {
        r"
        WHERE ($1::text IS NULL OR p.title ILIKE '%' || $1 || '%' ESCAPE '\')
          AND ($2::timestamptz IS NULL OR (p.created_at >= $2 AND p.created_at < $3))
          AND ($4::int4 IS NULL OR EXISTS (
                SELECT 1 FROM product_variants pv
                WHERE pv.product_id = p.id AND pv.variant_id = $4))
          AND ($5::numeric IS NULL OR EXISTS (
                SELECT 1 FROM product_variant_prices pvp
                WHERE pvp.product_id = p.id AND pvp.price BETWEEN $5 AND $6))
        "
    };
}

const LIST_PRODUCTS_SQL: &str = concat!(
    "SELECT p.id, p.title, p.sku, p.description, p.created_at, p.updated_at FROM products p",
    product_filter_clause!(),
    "ORDER BY p.id ASC LIMIT $7 OFFSET $8"
);

const COUNT_PRODUCTS_SQL: &str = concat!(
    "SELECT COUNT(*) FROM products p",
    product_filter_clause!()
);

const PRODUCT_COLUMNS: &str = "id, title, sku, description, created_at, updated_at";

/// Escape `LIKE` metacharacters so user input matches literally.
#[must_use]
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Start a write transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<CatalogWriter<'static>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(CatalogWriter { tx })
    }

    /// List one page of products matching `filter`, with variants and prices.
    ///
    /// Products are ordered by ID (insertion order). `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: i64,
        page_size: i64,
    ) -> Result<ProductPage, RepositoryError> {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(page_size);

        let title = filter.title.as_deref().map(escape_like);
        let (created_from, created_to) = filter.created_between.unzip();
        let (price_from, price_to) = filter.price_range.map(|r| (r.from, r.to)).unzip();

        // One snapshot for the page, the count and the child rows.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(LIST_PRODUCTS_SQL)
            .bind(title.as_deref())
            .bind(created_from)
            .bind(created_to)
            .bind(filter.variant_id)
            .bind(price_from)
            .bind(price_to)
            .bind(page_size)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(COUNT_PRODUCTS_SQL)
            .bind(title.as_deref())
            .bind(created_from)
            .bind(created_to)
            .bind(filter.variant_id)
            .bind(price_from)
            .bind(price_to)
            .fetch_one(&mut *tx)
            .await?;

        let products =
            attach_details(&mut *tx, rows.into_iter().map(Product::from).collect()).await?;
        tx.commit().await?;

        Ok(ProductPage {
            products,
            page,
            page_size,
            total,
        })
    }

    /// Get a product by ID with its variants and prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_details(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithDetails>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut details = attach_details(&mut *conn, vec![row.into()]).await?;
        Ok(details.pop())
    }

    /// List the images of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_images(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImageRow>(
            r"
            SELECT id, product_id, file_path
            FROM product_images
            WHERE product_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Load variants and prices for a batch of products with one query each.
async fn attach_details(
    conn: &mut PgConnection,
    products: Vec<Product>,
) -> Result<Vec<ProductWithDetails>, RepositoryError> {
    if products.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = products.iter().map(|p| p.id.as_i32()).collect();

    let variant_rows = sqlx::query_as::<_, ProductVariantRow>(
        r"
        SELECT id, product_id, variant_id, variant
        FROM product_variants
        WHERE product_id = ANY($1)
        ORDER BY id ASC
        ",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await?;

    let price_rows = sqlx::query_as::<_, ProductVariantPriceRow>(
        r"
        SELECT id, product_id, price, stock
        FROM product_variant_prices
        WHERE product_id = ANY($1)
        ORDER BY id ASC
        ",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await?;

    let mut variants: HashMap<i32, Vec<ProductVariant>> = HashMap::new();
    for row in variant_rows {
        variants.entry(row.product_id).or_default().push(row.into());
    }

    let mut prices: HashMap<i32, Vec<ProductVariantPrice>> = HashMap::new();
    for row in price_rows {
        prices.entry(row.product_id).or_default().push(row.into());
    }

    Ok(products
        .into_iter()
        .map(|product| {
            let key = product.id.as_i32();
            ProductWithDetails {
                variants: variants.remove(&key).unwrap_or_default(),
                prices: prices.remove(&key).unwrap_or_default(),
                product,
            }
        })
        .collect())
}

// =============================================================================
// Writer
// =============================================================================

/// A write transaction over the catalog tables.
pub struct CatalogWriter<'c> {
    tx: Transaction<'c, Postgres>,
}

impl CatalogWriter<'_> {
    /// Insert a product row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_product(
        &mut self,
        attributes: &ProductAttributes,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (title, sku, description)
            VALUES ($1, $2, $3)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&attributes.title)
        .bind(&attributes.sku)
        .bind(attributes.description.as_deref())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?;

        Ok(row.into())
    }

    /// Overwrite a product's attributes.
    ///
    /// The update takes the product's row lock, so concurrent writers of the
    /// same product queue behind this transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new SKU is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_product(
        &mut self,
        id: ProductId,
        attributes: &ProductAttributes,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET title = $2, sku = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&attributes.title)
        .bind(&attributes.sku)
        .bind(attributes.description.as_deref())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Insert variant rows for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant axis doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_variants(
        &mut self,
        product_id: ProductId,
        rows: &[NewProductVariant],
    ) -> Result<Vec<ProductVariant>, RepositoryError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for new in rows {
            let row = sqlx::query_as::<_, ProductVariantRow>(
                r"
                INSERT INTO product_variants (product_id, variant_id, variant)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, variant_id, variant
                ",
            )
            .bind(product_id)
            .bind(new.variant_id)
            .bind(&new.variant)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(RepositoryError::from_write)?;

            inserted.push(row.into());
        }
        Ok(inserted)
    }

    /// Delete every variant row of a product.
    ///
    /// # Returns
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_variants(&mut self, product_id: ProductId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Insert price rows for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a constraint violation.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_prices(
        &mut self,
        product_id: ProductId,
        rows: &[NewProductVariantPrice],
    ) -> Result<Vec<ProductVariantPrice>, RepositoryError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for new in rows {
            let row = sqlx::query_as::<_, ProductVariantPriceRow>(
                r"
                INSERT INTO product_variant_prices (product_id, price, stock)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, price, stock
                ",
            )
            .bind(product_id)
            .bind(new.price)
            .bind(new.stock)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(RepositoryError::from_write)?;

            inserted.push(row.into());
        }
        Ok(inserted)
    }

    /// Delete every price row of a product.
    ///
    /// # Returns
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_prices(&mut self, product_id: ProductId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variant_prices WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Record a stored image for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_image(
        &mut self,
        product_id: ProductId,
        file_path: &str,
    ) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ProductImageRow>(
            r"
            INSERT INTO product_images (product_id, file_path)
            VALUES ($1, $2)
            RETURNING id, product_id, file_path
            ",
        )
        .bind(product_id)
        .bind(file_path)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?;

        Ok(row.into())
    }

    /// Commit every write made through this writer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the commit fails.
    pub async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Roll back every write made through this writer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the rollback fails.
    pub async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
