//! Domain models for the catalog.

pub mod product;
pub mod variant;

pub use product::{
    NewProductVariant, NewProductVariantPrice, Product, ProductAttributes, ProductFilter,
    ProductImage, ProductPage, ProductSubmission, ProductVariant, ProductVariantPrice,
    ProductWithDetails, VariantPriceInput, VariantSelection,
};
pub use variant::{Variant, VariantGroup};
