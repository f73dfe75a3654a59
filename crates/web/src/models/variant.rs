//! Variant axis domain types.

use serde::Serialize;

use catalog_core::VariantId;

/// A catalog-wide variant axis, e.g. "Color" or "Size".
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub title: String,
    pub description: Option<String>,
}

/// A variant axis with the distinct tag values products currently use.
#[derive(Debug, Clone, Serialize)]
pub struct VariantGroup {
    pub variant: Variant,
    pub values: Vec<String>,
}
