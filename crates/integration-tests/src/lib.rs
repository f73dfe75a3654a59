//! Integration tests for the product catalog.
//!
//! # Running Tests
//!
//! ```bash
//! export CATALOG_TEST_DATABASE_URL=postgres://localhost/catalog_test
//! cargo test -p catalog-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own variant axes and uses unique titles and SKUs,
//! so tests can share one database and run in parallel.

use std::net::SocketAddr;

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use uuid::Uuid;

use catalog_core::VariantId;
use catalog_web::config::CatalogConfig;
use catalog_web::db::VariantRepository;
use catalog_web::models::{
    ProductAttributes, ProductSubmission, VariantPriceInput, VariantSelection,
};
use catalog_web::services::{CatalogSyncService, ImageStorage, VariantLayout};
use catalog_web::state::AppState;

/// Environment variable naming the test database.
pub const TEST_DATABASE_URL: &str = "CATALOG_TEST_DATABASE_URL";

/// Shared resources for one test.
pub struct TestContext {
    pub pool: PgPool,
    pub upload_dir: TempDir,
    pub storage: ImageStorage,
}

impl TestContext {
    /// Connect to the test database, apply migrations and create a scratch
    /// upload directory.
    ///
    /// # Panics
    ///
    /// Panics if `CATALOG_TEST_DATABASE_URL` is unset or unreachable.
    pub async fn new() -> Self {
        let url = std::env::var(TEST_DATABASE_URL)
            .unwrap_or_else(|_| panic!("{TEST_DATABASE_URL} must be set"));

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../web/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        let storage = ImageStorage::new(upload_dir.path());

        Self {
            pool,
            upload_dir,
            storage,
        }
    }

    /// A sync service over this context with the default page size.
    #[must_use]
    pub const fn service(&self, layout: VariantLayout) -> CatalogSyncService<'_> {
        CatalogSyncService::new(&self.pool, &self.storage, layout, 5)
    }

    /// Create a variant axis unique to the calling test.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn variant_axis(&self, label: &str) -> VariantId {
        VariantRepository::new(&self.pool)
            .ensure(&unique(label), None)
            .await
            .expect("Failed to create variant axis")
            .id
    }

    /// Number of rows in `table` belonging to `product_id`.
    ///
    /// # Panics
    ///
    /// Panics if the query fails.
    pub async fn child_count(&self, table: &str, product_id: i32) -> i64 {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to count rows")
    }

    /// Files currently under `folder` of the upload root.
    #[must_use]
    pub fn files_in(&self, folder: &str) -> Vec<String> {
        std::fs::read_dir(self.upload_dir.path().join(folder))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serve the full application on an ephemeral port.
    ///
    /// # Returns
    ///
    /// Returns the base URL, e.g. `http://127.0.0.1:43121`.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn_server(&self, layout: VariantLayout) -> String {
        let upload_dir = self.upload_dir.path().display().to_string();
        let layout = layout.to_string();
        let config = CatalogConfig::from_lookup(|key| match key {
            "CATALOG_DATABASE_URL" => std::env::var(TEST_DATABASE_URL).ok(),
            "CATALOG_UPLOAD_DIR" => Some(upload_dir.clone()),
            "CATALOG_VARIANT_LAYOUT" => Some(layout.clone()),
            _ => None,
        })
        .expect("Failed to build test config");

        let app = catalog_web::app(AppState::new(config, self.pool.clone()));

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        format!("http://{addr}")
    }
}

/// `prefix` followed by a short random suffix.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
    format!("{prefix}-{suffix}")
}

/// Build a submission from short-hand parts. Prices are given in cents.
#[must_use]
pub fn submission(
    title: &str,
    sku: &str,
    variants: Option<Vec<(VariantId, Vec<&str>)>>,
    prices: Option<Vec<(i64, i32)>>,
) -> ProductSubmission {
    ProductSubmission {
        attributes: ProductAttributes {
            title: title.to_string(),
            sku: sku.to_string(),
            description: Some(format!("{title} description")),
        },
        product_variant: variants.map(|selections| {
            selections
                .into_iter()
                .map(|(option, tags)| VariantSelection {
                    option,
                    tags: tags.iter().map(|t| (*t).to_string()).collect(),
                })
                .collect()
        }),
        product_variant_prices: prices.map(|rows| {
            rows.into_iter()
                .map(|(cents, stock)| VariantPriceInput {
                    price: Decimal::new(cents, 2),
                    stock,
                })
                .collect()
        }),
    }
}
