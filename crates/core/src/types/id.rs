//! Typed row IDs.
//!
//! Every catalog table has a `SERIAL` primary key. Wrapping each in its own
//! type keeps a `VariantId` from being bound where a `ProductId` belongs.

use thiserror::Error;

/// An ID string that is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {input:?}")]
pub struct ParseIdError {
    pub kind: &'static str,
    pub input: String,
}

/// Define an `i32` row ID newtype.
///
/// The generated type serializes as a bare integer, parses from strings
/// (rejecting zero and negatives, which `SERIAL` never produces) and, with
/// the `postgres` feature, binds and decodes as `INTEGER`.
///
/// ```rust
/// # use catalog_core::define_id;
/// define_id!(ShelfId);
///
/// let shelf: ShelfId = "12".parse().unwrap();
/// assert_eq!(shelf.as_i32(), 12);
/// assert!("0".parse::<ShelfId>().is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::ParseIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim()
                    .parse::<i32>()
                    .ok()
                    .filter(|id| *id > 0)
                    .map(Self)
                    .ok_or_else(|| $crate::ParseIdError {
                        kind: stringify!($name),
                        input: s.to_string(),
                    })
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(VariantId);
define_id!(ProductVariantId);
define_id!(ProductVariantPriceId);
define_id!(ProductImageId);
