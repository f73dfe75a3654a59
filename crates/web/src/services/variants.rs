//! Turning submitted variant selections into rows.
//!
//! Both create and update go through [`plan_variant_rows`], so a product
//! written once and then rewritten with the same submission ends up with the
//! same rows.

use std::fmt;
use std::str::FromStr;

use crate::models::{
    NewProductVariant, NewProductVariantPrice, ProductVariant, ProductVariantPrice,
    VariantPriceInput, VariantSelection,
};

/// Separator between tags when a selection is stored as one row.
pub const TAG_SEPARATOR: &str = " / ";

/// How a variant selection is laid out as `product_variants` rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariantLayout {
    /// One row per selection, tags joined with `" / "`.
    #[default]
    Joined,
    /// One row per tag.
    PerTag,
}

impl VariantLayout {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::PerTag => "per-tag",
        }
    }
}

impl fmt::Display for VariantLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a layout name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant layout {0:?} (expected \"joined\" or \"per-tag\")")]
pub struct UnknownLayout(String);

impl FromStr for VariantLayout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "joined" => Ok(Self::Joined),
            "per-tag" | "per_tag" | "pertag" => Ok(Self::PerTag),
            _ => Err(UnknownLayout(s.to_string())),
        }
    }
}

/// Build the variant rows for a set of selections.
///
/// Tags are trimmed and blank tags dropped. Submissions are validated to
/// carry at least one tag per selection, so under `Joined` every selection
/// yields exactly one row. Each row is a fresh value; nothing is carried over
/// from one selection to the next.
#[must_use]
pub fn plan_variant_rows(
    selections: &[VariantSelection],
    layout: VariantLayout,
) -> Vec<NewProductVariant> {
    let mut rows = Vec::new();

    for selection in selections {
        let tags: Vec<&str> = selection_tags(selection).collect();

        match layout {
            VariantLayout::Joined => rows.push(NewProductVariant {
                variant_id: selection.option,
                variant: tags.join(TAG_SEPARATOR),
            }),
            VariantLayout::PerTag => {
                rows.extend(tags.into_iter().map(|tag| NewProductVariant {
                    variant_id: selection.option,
                    variant: tag.to_string(),
                }));
            }
        }
    }

    rows
}

/// The non-blank tags of `selection`, trimmed.
pub fn selection_tags(selection: &VariantSelection) -> impl Iterator<Item = &str> {
    selection
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
}

/// Build the price rows for a set of submitted prices, in order.
#[must_use]
pub fn plan_price_rows(prices: &[VariantPriceInput]) -> Vec<NewProductVariantPrice> {
    prices.iter().map(NewProductVariantPrice::from).collect()
}

/// Rebuild the selections that would produce `rows` under `layout`.
///
/// Used to pre-fill the edit form. Under `Joined` each row is one selection;
/// under `PerTag` consecutive rows of the same axis are merged.
#[must_use]
pub fn selections_from_rows(rows: &[ProductVariant], layout: VariantLayout) -> Vec<VariantSelection> {
    let mut selections: Vec<VariantSelection> = Vec::new();

    for row in rows {
        match layout {
            VariantLayout::Joined => selections.push(VariantSelection {
                option: row.variant_id,
                tags: row.variant.split(TAG_SEPARATOR).map(str::to_string).collect(),
            }),
            VariantLayout::PerTag => match selections.last_mut() {
                Some(last) if last.option == row.variant_id => last.tags.push(row.variant.clone()),
                _ => selections.push(VariantSelection {
                    option: row.variant_id,
                    tags: vec![row.variant.clone()],
                }),
            },
        }
    }

    selections
}

/// Price inputs matching stored price rows.
#[must_use]
pub fn prices_from_rows(rows: &[ProductVariantPrice]) -> Vec<VariantPriceInput> {
    rows.iter()
        .map(|row| VariantPriceInput {
            price: row.price,
            stock: row.stock,
        })
        .collect()
}
