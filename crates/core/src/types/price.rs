//! Inclusive price ranges used by catalog search.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a price bound.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceRangeError {
    #[error("invalid price bound '{0}'")]
    InvalidBound(String),
}

/// An inclusive `[from, to]` price range.
///
/// A range only exists when both bounds are supplied. A search that carries
/// just one bound does not filter by price at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub from: Decimal,
    pub to: Decimal,
}

impl PriceRange {
    /// Build a range from optional raw query values.
    ///
    /// Blank values count as missing. Returns `Ok(None)` unless both bounds
    /// are present.
    ///
    /// # Errors
    ///
    /// Returns `PriceRangeError::InvalidBound` if a present bound is not a
    /// decimal number.
    pub fn from_query(
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Option<Self>, PriceRangeError> {
        let from = parse_bound(from)?;
        let to = parse_bound(to)?;

        Ok(match (from, to) {
            (Some(from), Some(to)) => Some(Self { from, to }),
            _ => None,
        })
    }
}

fn parse_bound(raw: Option<&str>) -> Result<Option<Decimal>, PriceRangeError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Decimal::from_str(value)
            .map(Some)
            .map_err(|_| PriceRangeError::InvalidBound(value.to_string())),
    }
}
