//! Product domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use catalog_core::{
    PriceRange, ProductId, ProductImageId, ProductVariantId, ProductVariantPriceId, VariantId,
};

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Stock keeping unit, unique across the catalog.
    pub sku: String,
    /// Optional long description.
    pub description: Option<String>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The attribute set of a product, written wholesale on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub title: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A variant axis a product exposes, with its tag value.
#[derive(Debug, Clone, Serialize)]
pub struct ProductVariant {
    pub id: ProductVariantId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    /// Tag value, e.g. `"Red"` or `"Red / Large"`.
    pub variant: String,
}

/// A priced stock keeping unit of a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductVariantPrice {
    pub id: ProductVariantPriceId,
    pub product_id: ProductId,
    pub price: Decimal,
    pub stock: i32,
}

/// A stored image file of a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    /// Path relative to the upload root, e.g. `prod_image/AbC...xyz.png`.
    pub file_path: String,
}

/// A product with its variants and prices loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithDetails {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub prices: Vec<ProductVariantPrice>,
}

// =============================================================================
// Sync Inputs
// =============================================================================

/// One requested variant axis with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    /// Variant axis ID.
    pub option: VariantId,
    /// Tag values under that axis.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One requested price row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPriceInput {
    pub price: Decimal,
    pub stock: i32,
}

/// The desired state submitted for a product.
///
/// `None` child collections mean "not supplied": on update the existing
/// rows of that kind are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSubmission {
    #[serde(flatten)]
    pub attributes: ProductAttributes,
    #[serde(default)]
    pub product_variant: Option<Vec<VariantSelection>>,
    #[serde(default)]
    pub product_variant_prices: Option<Vec<VariantPriceInput>>,
}

/// A product variant row ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProductVariant {
    pub variant_id: VariantId,
    pub variant: String,
}

/// A product variant price row ready to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewProductVariantPrice {
    pub price: Decimal,
    pub stock: i32,
}

impl From<&VariantPriceInput> for NewProductVariantPrice {
    fn from(input: &VariantPriceInput) -> Self {
        Self {
            price: input.price,
            stock: input.stock,
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Filter criteria for listing products.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Only products exposing this variant axis.
    pub variant_id: Option<VariantId>,
    /// Only products with at least one price inside this range.
    pub price_range: Option<PriceRange>,
    /// Only products created within `[start, end)`.
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// One page of products.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<ProductWithDetails>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
    /// Number of products matching the filter across all pages.
    pub total: i64,
}

impl ProductPage {
    /// Total number of pages (at least 1).
    #[must_use]
    pub const fn total_pages(&self) -> i64 {
        if self.total <= 0 {
            1
        } else {
            (self.total + self.page_size - 1) / self.page_size
        }
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// 1-based index of the first product on this page, or 0 when empty.
    #[must_use]
    pub fn first_index(&self) -> i64 {
        if self.products.is_empty() {
            0
        } else {
            (self.page - 1) * self.page_size + 1
        }
    }

    /// 1-based index of the last product on this page, or 0 when empty.
    #[must_use]
    pub fn last_index(&self) -> i64 {
        let shown = i64::try_from(self.products.len()).unwrap_or(i64::MAX);
        if shown == 0 {
            0
        } else {
            self.first_index() + shown - 1
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(total: i64, page: i64, shown: usize) -> ProductPage {
        let now = Utc::now();
        let products = (0..shown)
            .map(|i| ProductWithDetails {
                product: Product {
                    id: ProductId::new(i32::try_from(i).unwrap()),
                    title: format!("P{i}"),
                    sku: format!("SKU-{i}"),
                    description: None,
                    created_at: now,
                    updated_at: now,
                },
                variants: Vec::new(),
                prices: Vec::new(),
            })
            .collect();
        ProductPage {
            products,
            page,
            page_size: 5,
            total,
        }
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(page(0, 1, 0).total_pages(), 1);
        assert_eq!(page(5, 1, 5).total_pages(), 1);
        assert_eq!(page(6, 1, 5).total_pages(), 2);
        assert_eq!(page(11, 3, 1).total_pages(), 3);
    }

    #[test]
    fn test_page_navigation() {
        let first = page(11, 1, 5);
        assert!(first.has_next());
        assert!(!first.has_prev());

        let last = page(11, 3, 1);
        assert!(!last.has_next());
        assert!(last.has_prev());
    }

    #[test]
    fn test_showing_indices() {
        let second = page(11, 2, 5);
        assert_eq!(second.first_index(), 6);
        assert_eq!(second.last_index(), 10);

        let empty = page(0, 1, 0);
        assert_eq!(empty.first_index(), 0);
        assert_eq!(empty.last_index(), 0);
    }

    #[test]
    fn test_submission_deserializes_request_shape() {
        let json = serde_json::json!({
            "title": "Shirt",
            "sku": "shirt-1",
            "description": "Cotton",
            "product_variant": [{"option": 2, "tags": ["Red", "Large"]}],
            "product_variant_prices": [{"price": 10, "stock": 5}, {"price": "12.50", "stock": 3}]
        });

        let submission: ProductSubmission = serde_json::from_value(json).unwrap();
        assert_eq!(submission.attributes.title, "Shirt");
        assert_eq!(submission.attributes.sku, "shirt-1");

        let selections = submission.product_variant.unwrap();
        assert_eq!(selections[0].option, VariantId::new(2));
        assert_eq!(selections[0].tags, vec!["Red", "Large"]);

        let prices = submission.product_variant_prices.unwrap();
        assert_eq!(prices[0].price, Decimal::new(10, 0));
        assert_eq!(prices[1].price, Decimal::new(1250, 2));
        assert_eq!(prices[1].stock, 3);
    }

    #[test]
    fn test_submission_children_optional() {
        let json = serde_json::json!({"title": "Mug", "sku": "mug-1"});
        let submission: ProductSubmission = serde_json::from_value(json).unwrap();
        assert!(submission.product_variant.is_none());
        assert!(submission.product_variant_prices.is_none());
        assert!(submission.attributes.description.is_none());
    }
}
