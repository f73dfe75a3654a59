//! HTTP route handlers for the catalog.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Redirect to /products
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Products
//! GET  /products               - Product listing
//! GET  /products/search        - Filtered product listing
//! GET  /products/create        - Create form
//! POST /products               - Store (multipart or JSON, JSON envelope)
//! GET  /products/{id}/edit     - Edit form
//! PUT  /products/{id}          - Update (JSON envelope)
//! POST /products/{id}          - Update (form-friendly alias)
//!
//! # Uploads
//! GET  /storage/*              - Stored product images
//! ```

pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::get,
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::store))
        .route("/search", get(products::search))
        .route("/create", get(products::create))
        .route("/{id}", axum::routing::put(products::update).post(products::update))
        .route("/{id}/edit", get(products::edit))
}

/// Create all routes for the catalog.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/products") }))
        .nest("/products", product_routes())
}
