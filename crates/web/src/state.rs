//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::CatalogConfig;
use crate::services::{CatalogSyncService, ImageStorage};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CatalogConfig,
    pool: PgPool,
    storage: ImageStorage,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Catalog configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: CatalogConfig, pool: PgPool) -> Self {
        let storage = ImageStorage::new(config.upload_dir.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                storage,
            }),
        }
    }

    /// Get a reference to the catalog configuration.
    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the image storage.
    #[must_use]
    pub fn storage(&self) -> &ImageStorage {
        &self.inner.storage
    }

    /// Build a sync service borrowing this state's resources.
    #[must_use]
    pub fn catalog(&self) -> CatalogSyncService<'_> {
        CatalogSyncService::new(
            &self.inner.pool,
            &self.inner.storage,
            self.inner.config.variant_layout,
            self.inner.config.page_size,
        )
    }
}
