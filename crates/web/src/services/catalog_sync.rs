//! Catalog synchronization service.
//!
//! Writes a submitted product (attributes, variant rows, price rows and an
//! optional image) in one transaction, and answers the filtered listing.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use catalog_core::{PriceRange, PriceRangeError, ProductId, VariantId};

use super::storage::{ImageStorage, PRODUCT_IMAGE_FOLDER, StagedImage, StorageError};
use super::variants::{VariantLayout, plan_price_rows, plan_variant_rows, selection_tags};
use crate::db::{CatalogWriter, ProductRepository, RepositoryError, VariantRepository};
use crate::models::{
    Product, ProductFilter, ProductPage, ProductSubmission, ProductWithDetails, VariantGroup,
};

/// Message returned in the envelope of a successful write.
pub const SUCCESS_MESSAGE: &str = "Success!!";

/// Errors from catalog synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The submission failed validation.
    #[error("{0}")]
    Invalid(String),

    /// A listing filter could not be parsed.
    #[error("{0}")]
    InvalidFilter(String),

    /// The product was committed but its image could not be moved into place.
    #[error("product {product_id} was saved but its image could not be stored: {source}")]
    ImageNotStored {
        product_id: ProductId,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    /// Whether this failure was caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Invalid(_)
                | Self::InvalidFilter(_)
                | Self::Storage(StorageError::InvalidUpload(_))
                | Self::Repository(RepositoryError::NotFound | RepositoryError::Conflict(_))
        )
    }
}

impl From<PriceRangeError> for SyncError {
    fn from(err: PriceRangeError) -> Self {
        Self::InvalidFilter(err.to_string())
    }
}

/// Wire envelope returned by store and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResponse {
    pub status: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
}

impl SyncResponse {
    #[must_use]
    pub fn success(product_id: Option<ProductId>) -> Self {
        Self {
            status: true,
            msg: SUCCESS_MESSAGE.to_string(),
            product_id,
        }
    }

    #[must_use]
    pub fn failure(err: &SyncError) -> Self {
        let product_id = match err {
            SyncError::ImageNotStored { product_id, .. } => Some(*product_id),
            _ => None,
        };
        Self {
            status: false,
            msg: err.to_string(),
            product_id,
        }
    }
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// File name as sent by the client; only its extension is kept.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Raw listing query parameters.
///
/// Everything arrives as text so that empty form fields (`variant=`) mean
/// "no filter" instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub title: Option<String>,
    pub variant: Option<String>,
    pub price_from: Option<String>,
    pub price_to: Option<String>,
    pub date: Option<String>,
    pub page: Option<String>,
}

impl ListQuery {
    /// 1-based page number; anything unparseable is page 1.
    #[must_use]
    pub fn page(&self) -> i64 {
        non_blank(self.page.as_deref())
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    /// Build the typed filter.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidFilter` for an unparseable variant id,
    /// price bound or date.
    pub fn to_filter(&self) -> Result<ProductFilter, SyncError> {
        let title = non_blank(self.title.as_deref()).map(str::to_string);

        let variant_id = non_blank(self.variant.as_deref())
            .map(str::parse::<VariantId>)
            .transpose()
            .map_err(|e| SyncError::InvalidFilter(format!("invalid variant: {}", e.input)))?;

        let price_range =
            PriceRange::from_query(self.price_from.as_deref(), self.price_to.as_deref())?;

        let created_between = non_blank(self.date.as_deref())
            .map(|raw| {
                parse_filter_date(raw)
                    .map(local_day_bounds)
                    .ok_or_else(|| SyncError::InvalidFilter(format!("invalid date: {raw}")))
            })
            .transpose()?;

        Ok(ProductFilter {
            title,
            variant_id,
            price_range,
            created_between,
        })
    }
}

/// Catalog synchronization service.
pub struct CatalogSyncService<'a> {
    pool: &'a PgPool,
    storage: &'a ImageStorage,
    layout: VariantLayout,
    page_size: i64,
}

impl<'a> CatalogSyncService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        storage: &'a ImageStorage,
        layout: VariantLayout,
        page_size: i64,
    ) -> Self {
        Self {
            pool,
            storage,
            layout,
            page_size,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create a product with its child rows and optional image.
    ///
    /// The image is staged before the transaction starts and promoted only
    /// after commit. On any failure before commit the staged file is
    /// discarded and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Invalid` for a bad submission, `SyncError::Repository`
    /// or `SyncError::Storage` if a write fails, and `SyncError::ImageNotStored`
    /// if the product committed but the image could not be promoted.
    #[instrument(skip(self, submission, image), fields(sku = %submission.attributes.sku))]
    pub async fn create_product(
        &self,
        submission: &ProductSubmission,
        image: Option<ImageUpload>,
    ) -> Result<ProductId, SyncError> {
        validate(submission)?;

        let staged = match image {
            Some(upload) => Some(
                self.storage
                    .stage(PRODUCT_IMAGE_FOLDER, &upload.file_name, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let image_path = staged
            .as_ref()
            .map(|s| s.final_relative_path().to_string());

        let product = match self.write_new_product(submission, image_path.as_deref()).await {
            Ok(product) => product,
            Err(e) => {
                if let Some(staged) = staged {
                    self.discard_quietly(staged).await;
                }
                return Err(e);
            }
        };

        if let Some(staged) = staged
            && let Err(source) = self.storage.promote(staged).await
        {
            tracing::error!(
                product_id = %product.id,
                file_path = image_path.as_deref().unwrap_or_default(),
                error = %source,
                "Failed to promote staged image after commit"
            );
            return Err(SyncError::ImageNotStored {
                product_id: product.id,
                source,
            });
        }

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product.id)
    }

    /// Overwrite a product and replace the child collections that were supplied.
    ///
    /// A collection that is `None` in the submission is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository(RepositoryError::NotFound)` if the
    /// product does not exist, or another `SyncError` if a write fails. Nothing
    /// is changed on failure.
    #[instrument(skip(self, submission), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        submission: &ProductSubmission,
    ) -> Result<Product, SyncError> {
        validate(submission)?;

        let mut writer = ProductRepository::new(self.pool).begin().await?;
        match self.replace_product(&mut writer, id, submission).await {
            Ok(product) => {
                writer.commit().await?;
                tracing::info!("Product updated");
                Ok(product)
            }
            Err(e) => {
                rollback_quietly(writer).await;
                Err(e)
            }
        }
    }

    async fn write_new_product(
        &self,
        submission: &ProductSubmission,
        image_path: Option<&str>,
    ) -> Result<Product, SyncError> {
        let mut writer = ProductRepository::new(self.pool).begin().await?;
        match self.insert_product(&mut writer, submission, image_path).await {
            Ok(product) => {
                writer.commit().await?;
                Ok(product)
            }
            Err(e) => {
                rollback_quietly(writer).await;
                Err(e)
            }
        }
    }

    async fn insert_product(
        &self,
        writer: &mut CatalogWriter<'_>,
        submission: &ProductSubmission,
        image_path: Option<&str>,
    ) -> Result<Product, SyncError> {
        let product = writer.insert_product(&submission.attributes).await?;

        if let Some(selections) = &submission.product_variant {
            let rows = plan_variant_rows(selections, self.layout);
            writer.insert_variants(product.id, &rows).await?;
        }

        if let Some(prices) = &submission.product_variant_prices {
            writer
                .insert_prices(product.id, &plan_price_rows(prices))
                .await?;
        }

        if let Some(path) = image_path {
            writer.insert_image(product.id, path).await?;
        }

        Ok(product)
    }

    async fn replace_product(
        &self,
        writer: &mut CatalogWriter<'_>,
        id: ProductId,
        submission: &ProductSubmission,
    ) -> Result<Product, SyncError> {
        // Takes the row lock; concurrent updates of this product wait here.
        let product = writer.update_product(id, &submission.attributes).await?;

        if let Some(selections) = &submission.product_variant {
            let rows = plan_variant_rows(selections, self.layout);
            let removed = writer.delete_variants(id).await?;
            writer.insert_variants(id, &rows).await?;
            tracing::debug!(removed, inserted = rows.len(), "Replaced variants");
        }

        if let Some(prices) = &submission.product_variant_prices {
            let rows = plan_price_rows(prices);
            let removed = writer.delete_prices(id).await?;
            writer.insert_prices(id, &rows).await?;
            tracing::debug!(removed, inserted = rows.len(), "Replaced prices");
        }

        Ok(product)
    }

    async fn discard_quietly(&self, staged: StagedImage) {
        let path = staged.staged_path().display().to_string();
        if let Err(e) = self.storage.discard(staged).await {
            tracing::warn!(path = %path, error = %e, "Failed to discard staged image");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// List one page of products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidFilter` for an unparseable filter value, or
    /// `SyncError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ListQuery) -> Result<ProductPage, SyncError> {
        let filter = query.to_filter()?;
        let page = ProductRepository::new(self.pool)
            .list(&filter, query.page(), self.page_size)
            .await?;
        Ok(page)
    }

    /// Get a product with its variants and prices.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository(RepositoryError::NotFound)` if the
    /// product does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductWithDetails, SyncError> {
        ProductRepository::new(self.pool)
            .get_with_details(id)
            .await?
            .ok_or(SyncError::Repository(RepositoryError::NotFound))
    }

    /// List every variant axis with the tag values in use under it.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository` if a query fails.
    pub async fn list_variant_groups(&self) -> Result<Vec<VariantGroup>, SyncError> {
        Ok(VariantRepository::new(self.pool).list_groups().await?)
    }
}

async fn rollback_quietly(writer: CatalogWriter<'_>) {
    if let Err(e) = writer.rollback().await {
        tracing::warn!(error = %e, "Rollback failed; transaction dropped");
    }
}

fn validate(submission: &ProductSubmission) -> Result<(), SyncError> {
    let attributes = &submission.attributes;
    if attributes.title.trim().is_empty() {
        return Err(SyncError::Invalid("title is required".to_string()));
    }
    if attributes.sku.trim().is_empty() {
        return Err(SyncError::Invalid("sku is required".to_string()));
    }

    for (n, selection) in submission.product_variant.iter().flatten().enumerate() {
        if selection_tags(selection).next().is_none() {
            return Err(SyncError::Invalid(format!("selection {} has no tags", n + 1)));
        }
    }

    for price in submission.product_variant_prices.iter().flatten() {
        if price.price.is_sign_negative() {
            return Err(SyncError::Invalid(format!(
                "price must not be negative: {}",
                price.price
            )));
        }
        if price.stock < 0 {
            return Err(SyncError::Invalid(format!(
                "stock must not be negative: {}",
                price.stock
            )));
        }
    }

    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Dates
// =============================================================================

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a user-supplied date into a calendar date.
///
/// RFC 3339 timestamps are converted to the server's local date first.
#[must_use]
pub fn parse_filter_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Local).date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// `[midnight, next midnight)` of `date` in the server's local time zone, as UTC.
#[must_use]
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    day_bounds(date, &Local)
}

fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .succ_opt()
        .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::MIN));

    (local_midnight(&start, tz), local_midnight(&end, tz))
}

/// A local midnight skipped by DST resolves to the first instant after the gap.
fn local_midnight<Tz: TimeZone>(local: &NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    tz.from_local_datetime(local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*local + Duration::hours(1))).earliest())
        .map_or_else(|| local.and_utc(), |t| t.with_timezone(&Utc))
}
