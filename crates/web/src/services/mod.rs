//! Business logic services for the catalog.
//!
//! # Services
//!
//! - `catalog_sync` - Create, update and list products with their child rows
//! - `storage` - Staged image storage under the upload root
//! - `variants` - Planning variant and price rows from a submission

pub mod catalog_sync;
pub mod storage;
pub mod variants;

pub use catalog_sync::{CatalogSyncService, ImageUpload, ListQuery, SyncError, SyncResponse};
pub use storage::{ImageStorage, StagedImage, StorageError};
pub use variants::{
    VariantLayout, plan_price_rows, plan_variant_rows, prices_from_rows, selection_tags,
    selections_from_rows,
};
