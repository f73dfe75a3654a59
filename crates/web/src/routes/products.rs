//! Product route handlers.
//!
//! Page handlers render askama templates and fail with [`AppError`]. The
//! store and update handlers always answer with a [`SyncResponse`] envelope.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::Deserialize;

use catalog_core::ProductId;

use crate::error::{AppError, Result, report_sync_failure};
use crate::models::{ProductPage, ProductSubmission, ProductWithDetails, VariantGroup};
use crate::services::{
    ImageUpload, ListQuery, SyncError, SyncResponse, VariantLayout, prices_from_rows,
    selections_from_rows,
};
use crate::state::AppState;

/// Multipart field carrying the JSON submission.
pub const PAYLOAD_FIELD: &str = "payload";
/// Multipart field carrying the product image.
pub const IMAGE_FIELD: &str = "product_image";

// =============================================================================
// View Models
// =============================================================================

/// Variant axis display data for filter and form selects.
#[derive(Clone)]
pub struct VariantOptionView {
    pub id: i32,
    pub title: String,
    /// Tag values in use, comma separated.
    pub values: String,
    pub selected: bool,
}

impl From<&VariantGroup> for VariantOptionView {
    fn from(group: &VariantGroup) -> Self {
        Self {
            id: group.variant.id.as_i32(),
            title: group.variant.title.clone(),
            values: group.values.join(", "),
            selected: false,
        }
    }
}

/// Price row display data.
#[derive(Clone)]
pub struct PriceView {
    pub price: String,
    pub stock: i32,
}

/// Product row display data for the listing.
#[derive(Clone)]
pub struct ProductRowView {
    /// 1-based position across all pages.
    pub number: i64,
    pub id: i32,
    pub title: String,
    pub sku: String,
    pub description: String,
    pub created: String,
    pub variants: Vec<String>,
    pub prices: Vec<PriceView>,
}

impl ProductRowView {
    fn new(number: i64, details: &ProductWithDetails) -> Self {
        let product = &details.product;
        Self {
            number,
            id: product.id.as_i32(),
            title: product.title.clone(),
            sku: product.sku.clone(),
            description: product.description.clone().unwrap_or_default(),
            created: product
                .created_at
                .with_timezone(&Local)
                .format("%d-%b-%Y")
                .to_string(),
            variants: details.variants.iter().map(|v| v.variant.clone()).collect(),
            prices: details
                .prices
                .iter()
                .map(|p| PriceView {
                    price: format!("{:.2}", p.price),
                    stock: p.stock,
                })
                .collect(),
        }
    }
}

/// Current filter values echoed back into the search form.
#[derive(Clone, Default)]
pub struct FilterView {
    pub title: String,
    pub variant: Option<i32>,
    pub price_from: String,
    pub price_to: String,
    pub date: String,
}

impl From<&ListQuery> for FilterView {
    fn from(query: &ListQuery) -> Self {
        let text = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
        Self {
            title: text(&query.title),
            variant: query.variant.as_deref().and_then(|v| v.trim().parse().ok()),
            price_from: text(&query.price_from),
            price_to: text(&query.price_to),
            date: text(&query.date),
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductRowView>,
    pub variants: Vec<VariantOptionView>,
    pub filter: FilterView,
    pub first_index: i64,
    pub last_index: i64,
    pub total: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

/// Create form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/create.html")]
pub struct ProductCreateTemplate {
    pub variants: Vec<VariantOptionView>,
    pub allow_image: bool,
}

/// Edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/edit.html")]
pub struct ProductEditTemplate {
    pub product_id: i32,
    pub title: String,
    pub variants: Vec<VariantOptionView>,
    pub allow_image: bool,
    /// Current state as a submission, for the form script.
    pub product_json: String,
}

// =============================================================================
// Pages
// =============================================================================

/// Query parameters of the unfiltered listing.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Display the product listing.
///
/// # Route
///
/// `GET /products`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ProductsIndexTemplate> {
    let query = ListQuery {
        page: query.page,
        ..ListQuery::default()
    };
    render_index(&state, "/products", &query).await
}

/// Display the product listing filtered by title, variant, price and date.
///
/// # Route
///
/// `GET /products/search`
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ProductsIndexTemplate> {
    render_index(&state, "/products/search", &query).await
}

async fn render_index(
    state: &AppState,
    path: &str,
    query: &ListQuery,
) -> Result<ProductsIndexTemplate> {
    let catalog = state.catalog();
    let page = catalog.list_products(query).await?;
    let groups = catalog.list_variant_groups().await?;

    Ok(index_template(path, query, &page, &groups))
}

fn index_template(
    path: &str,
    query: &ListQuery,
    page: &ProductPage,
    groups: &[VariantGroup],
) -> ProductsIndexTemplate {
    let first_index = page.first_index();
    let products = page
        .products
        .iter()
        .zip(first_index..)
        .map(|(details, number)| ProductRowView::new(number, details))
        .collect();

    let filter = FilterView::from(query);
    let variants = groups
        .iter()
        .map(|group| {
            let mut option = VariantOptionView::from(group);
            option.selected = filter.variant == Some(option.id);
            option
        })
        .collect();

    ProductsIndexTemplate {
        products,
        variants,
        filter,
        first_index,
        last_index: page.last_index(),
        total: page.total,
        current_page: page.page,
        total_pages: page.total_pages(),
        prev_url: page
            .has_prev()
            .then(|| page_url(path, query, page.page - 1)),
        next_url: page
            .has_next()
            .then(|| page_url(path, query, page.page + 1)),
    }
}

/// Link to another page of the same listing, keeping the active filters.
fn page_url(path: &str, query: &ListQuery, page: i64) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    let filters = [
        ("title", &query.title),
        ("variant", &query.variant),
        ("price_from", &query.price_from),
        ("price_to", &query.price_to),
        ("date", &query.date),
    ];
    for (key, value) in filters {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            params.append_pair(key, value);
        }
    }
    params.append_pair("page", &page.to_string());
    format!("{path}?{}", params.finish())
}

/// Display the create form.
///
/// # Route
///
/// `GET /products/create`
pub async fn create(State(state): State<AppState>) -> Result<ProductCreateTemplate> {
    let groups = state.catalog().list_variant_groups().await?;
    Ok(ProductCreateTemplate {
        variants: groups.iter().map(VariantOptionView::from).collect(),
        allow_image: true,
    })
}

/// Display the edit form for a product.
///
/// # Route
///
/// `GET /products/{id}/edit`
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ProductEditTemplate> {
    let catalog = state.catalog();
    let details = catalog.get_product(id).await?;
    let groups = catalog.list_variant_groups().await?;

    let product_json = edit_payload(&details, state.config().variant_layout)
        .map_err(|e| AppError::Internal(format!("failed to encode product: {e}")))?;

    Ok(ProductEditTemplate {
        product_id: details.product.id.as_i32(),
        title: details.product.title.clone(),
        variants: groups.iter().map(VariantOptionView::from).collect(),
        allow_image: false,
        product_json,
    })
}

/// The stored product expressed as the submission that would recreate it.
fn edit_payload(
    details: &ProductWithDetails,
    layout: VariantLayout,
) -> std::result::Result<String, serde_json::Error> {
    let product = &details.product;
    let submission = serde_json::json!({
        "title": product.title,
        "sku": product.sku,
        "description": product.description,
        "product_variant": selections_from_rows(&details.variants, layout),
        "product_variant_prices": prices_from_rows(&details.prices),
    });
    serde_json::to_string(&submission)
}

// =============================================================================
// Writes
// =============================================================================

/// Store a new product.
///
/// Accepts `multipart/form-data` (`payload` JSON field plus an optional
/// `product_image` file) or a plain JSON body.
///
/// # Route
///
/// `POST /products`
pub async fn store(State(state): State<AppState>, form: ProductForm) -> Json<SyncResponse> {
    match state
        .catalog()
        .create_product(&form.submission, form.image)
        .await
    {
        Ok(product_id) => Json(SyncResponse::success(Some(product_id))),
        Err(e) => {
            report_sync_failure(&e, "store");
            Json(SyncResponse::failure(&e))
        }
    }
}

/// Update an existing product.
///
/// # Route
///
/// `PUT /products/{id}` or `POST /products/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    form: ProductForm,
) -> Json<SyncResponse> {
    if form.image.is_some() {
        let err = SyncError::Invalid("images can only be uploaded when creating a product".to_string());
        report_sync_failure(&err, "update");
        return Json(SyncResponse::failure(&err));
    }

    match state.catalog().update_product(id, &form.submission).await {
        Ok(_) => Json(SyncResponse::success(None)),
        Err(e) => {
            report_sync_failure(&e, "update");
            Json(SyncResponse::failure(&e))
        }
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// A submitted product, from either a multipart form or a JSON body.
#[derive(Debug)]
pub struct ProductForm {
    pub submission: ProductSubmission,
    pub image: Option<ImageUpload>,
}

/// Rejection for an unreadable submission, answered inside the envelope.
#[derive(Debug)]
pub struct SubmissionRejection(pub String);

impl IntoResponse for SubmissionRejection {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "Rejected product submission");
        Json(SyncResponse {
            status: false,
            msg: self.0,
            product_id: None,
        })
        .into_response()
    }
}

impl<S: Send + Sync> FromRequest<S> for ProductForm {
    type Rejection = SubmissionRejection;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| SubmissionRejection(e.body_text()))?;
            read_multipart(multipart).await
        } else {
            let Json(submission) = Json::<ProductSubmission>::from_request(req, state)
                .await
                .map_err(|e| SubmissionRejection(e.body_text()))?;
            Ok(Self {
                submission,
                image: None,
            })
        }
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> std::result::Result<ProductForm, SubmissionRejection> {
    let mut submission = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SubmissionRejection(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PAYLOAD_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| SubmissionRejection(e.body_text()))?;
                let parsed: ProductSubmission = serde_json::from_str(&text)
                    .map_err(|e| SubmissionRejection(format!("invalid payload: {e}")))?;
                submission = Some(parsed);
            }
            Some(IMAGE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| SubmissionRejection(e.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let submission = submission
        .ok_or_else(|| SubmissionRejection(format!("missing `{PAYLOAD_FIELD}` field")))?;
    Ok(ProductForm { submission, image })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use catalog_core::{ProductVariantId, ProductVariantPriceId, VariantId};

    use super::*;
    use crate::models::{Product, ProductVariant, ProductVariantPrice};

    fn details() -> ProductWithDetails {
        let now = Utc::now();
        ProductWithDetails {
            product: Product {
                id: ProductId::new(3),
                title: "Shirt".to_string(),
                sku: "shirt-1".to_string(),
                description: Some("Cotton".to_string()),
                created_at: now,
                updated_at: now,
            },
            variants: vec![ProductVariant {
                id: ProductVariantId::new(1),
                product_id: ProductId::new(3),
                variant_id: VariantId::new(2),
                variant: "Red / Large".to_string(),
            }],
            prices: vec![ProductVariantPrice {
                id: ProductVariantPriceId::new(1),
                product_id: ProductId::new(3),
                price: Decimal::new(1250, 2),
                stock: 4,
            }],
        }
    }

    #[test]
    fn test_page_url_keeps_filters() {
        let query = ListQuery {
            title: Some("red shirt".to_string()),
            variant: Some("2".to_string()),
            price_from: Some(String::new()),
            ..ListQuery::default()
        };
        assert_eq!(
            page_url("/products/search", &query, 2),
            "/products/search?title=red+shirt&variant=2&page=2"
        );
        assert_eq!(
            page_url("/products", &ListQuery::default(), 3),
            "/products?page=3"
        );
    }

    #[test]
    fn test_row_view_formats_prices() {
        let row = ProductRowView::new(6, &details());
        assert_eq!(row.number, 6);
        assert_eq!(row.variants, vec!["Red / Large"]);
        assert_eq!(row.prices[0].price, "12.50");
        assert_eq!(row.prices[0].stock, 4);
    }

    #[test]
    fn test_edit_payload_round_trips_into_submission() {
        let json = edit_payload(&details(), VariantLayout::Joined).unwrap();
        let submission: ProductSubmission = serde_json::from_str(&json).unwrap();

        assert_eq!(submission.attributes.sku, "shirt-1");
        let selections = submission.product_variant.unwrap();
        assert_eq!(selections[0].option, VariantId::new(2));
        assert_eq!(selections[0].tags, vec!["Red", "Large"]);
        assert_eq!(
            submission.product_variant_prices.unwrap()[0].price,
            Decimal::new(1250, 2)
        );
    }

    #[test]
    fn test_filter_view_echoes_query() {
        let view = FilterView::from(&ListQuery {
            title: Some(" mug ".to_string()),
            variant: Some("4".to_string()),
            ..ListQuery::default()
        });
        assert_eq!(view.title, "mug");
        assert_eq!(view.variant, Some(4));
        assert!(view.date.is_empty());
    }
}
