//! Catalog Core - Shared types library.
//!
//! This crate provides the types shared by the catalog components:
//! - `web` - Catalog web application (listing, search, create, update)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP. Database encoding for IDs is available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and price ranges

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
