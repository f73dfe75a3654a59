//! Database-backed tests for catalog synchronization.
//!
//! These tests require a `PostgreSQL` database named by
//! `CATALOG_TEST_DATABASE_URL`. Migrations are applied automatically.
//!
//! Run with: cargo test -p catalog-integration-tests -- --ignored

use chrono::{Duration, Local, NaiveDate, TimeZone};
use rust_decimal::Decimal;

use catalog_core::{ProductId, VariantId};
use catalog_integration_tests::{TestContext, submission, unique};
use catalog_web::db::{ProductRepository, RepositoryError};
use catalog_web::services::{ImageUpload, ListQuery, SyncError, SyncResponse, VariantLayout};

fn image(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        bytes: b"\x89PNG fake image bytes".to_vec(),
    }
}

fn title_query(title: &str) -> ListQuery {
    ListQuery {
        title: Some(title.to_string()),
        ..ListQuery::default()
    }
}

async fn sku_count(ctx: &TestContext, sku: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sku = $1")
        .bind(sku)
        .fetch_one(&ctx.pool)
        .await
        .expect("Failed to count products")
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_create_product_with_joined_variants_and_prices() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let size = ctx.variant_axis("Size").await;

    let id = service
        .create_product(
            &submission(
                &unique("Shirt"),
                &unique("sku"),
                Some(vec![(color, vec!["Red", "Blue"]), (size, vec!["L"])]),
                Some(vec![(1000, 5), (1250, 3)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    let details = service.get_product(id).await.expect("Product missing");
    let variants: Vec<(VariantId, &str)> = details
        .variants
        .iter()
        .map(|v| (v.variant_id, v.variant.as_str()))
        .collect();
    assert_eq!(variants, vec![(color, "Red / Blue"), (size, "L")]);

    let prices: Vec<(Decimal, i32)> = details.prices.iter().map(|p| (p.price, p.stock)).collect();
    assert_eq!(
        prices,
        vec![(Decimal::new(1000, 2), 5), (Decimal::new(1250, 2), 3)]
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_create_product_per_tag_layout() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::PerTag);
    let size = ctx.variant_axis("Size").await;

    let id = service
        .create_product(
            &submission(
                &unique("Tee"),
                &unique("sku"),
                Some(vec![(size, vec!["S", "M", "L"])]),
                None,
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    let details = service.get_product(id).await.expect("Product missing");
    let tags: Vec<&str> = details.variants.iter().map(|v| v.variant.as_str()).collect();
    assert_eq!(tags, vec!["S", "M", "L"]);
    assert!(details.variants.iter().all(|v| v.variant_id == size));
    assert!(details.prices.is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_create_duplicate_sku_rolls_back() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let sku = unique("sku");

    service
        .create_product(&submission(&unique("Mug"), &sku, None, None), None)
        .await
        .expect("Failed to create first product");

    let err = service
        .create_product(
            &submission(&unique("Mug"), &sku, None, Some(vec![(500, 1)])),
            Some(image("mug.png")),
        )
        .await
        .expect_err("Duplicate SKU must fail");

    assert!(matches!(
        err,
        SyncError::Repository(RepositoryError::Conflict(_))
    ));
    assert_eq!(sku_count(&ctx, &sku).await, 1);
    assert!(ctx.files_in("prod_image").is_empty());
    assert!(ctx.files_in(".staging").is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_create_unknown_variant_axis_leaves_nothing() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let sku = unique("sku");

    let err = service
        .create_product(
            &submission(
                &unique("Cap"),
                &sku,
                Some(vec![(VariantId::new(i32::MAX), vec!["Red"])]),
                None,
            ),
            None,
        )
        .await
        .expect_err("Unknown axis must fail");

    assert!(matches!(
        err,
        SyncError::Repository(RepositoryError::Conflict(_))
    ));
    assert_eq!(sku_count(&ctx, &sku).await, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_create_with_image_promotes_file() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);

    let id = service
        .create_product(
            &submission(&unique("Poster"), &unique("sku"), None, None),
            Some(image("poster.PNG")),
        )
        .await
        .expect("Failed to create product");

    let images = ProductRepository::new(&ctx.pool)
        .list_images(id)
        .await
        .expect("Failed to list images");
    assert_eq!(images.len(), 1);

    let file_path = &images[0].file_path;
    assert!(file_path.starts_with("prod_image/"));
    assert!(file_path.ends_with(".png"));
    assert_eq!(file_path.len(), "prod_image/".len() + 40 + ".png".len());
    assert!(ctx.upload_dir.path().join(file_path).is_file());
    assert!(ctx.files_in(".staging").is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_image_promotion_failure_keeps_committed_product() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let sku = unique("sku");

    // A plain file where the image folder should be makes the rename fail.
    std::fs::write(ctx.upload_dir.path().join("prod_image"), b"not a directory")
        .expect("Failed to block image folder");

    let err = service
        .create_product(
            &submission(&unique("Frame"), &sku, None, None),
            Some(image("frame.jpg")),
        )
        .await
        .expect_err("Promotion must fail");

    let SyncError::ImageNotStored { product_id, .. } = &err else {
        panic!("expected ImageNotStored, got {err:?}");
    };
    assert_eq!(sku_count(&ctx, &sku).await, 1);
    assert_eq!(ctx.child_count("product_images", product_id.as_i32()).await, 1);
    assert_eq!(ctx.files_in(".staging").len(), 1);

    let envelope = SyncResponse::failure(&err);
    assert!(!envelope.status);
    assert_eq!(envelope.product_id, Some(*product_id));
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_update_replaces_children_and_is_idempotent() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let size = ctx.variant_axis("Size").await;
    let sku = unique("sku");

    let id = service
        .create_product(
            &submission(
                "Jacket",
                &sku,
                Some(vec![(color, vec!["Black"])]),
                Some(vec![(9900, 2)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    let new_title = unique("Jacket v2");
    let update = submission(
        &new_title,
        &sku,
        Some(vec![(color, vec!["Green", "Olive"]), (size, vec!["M"])]),
        Some(vec![(8900, 4), (9900, 1)]),
    );

    for _ in 0..2 {
        service
            .update_product(id, &update)
            .await
            .expect("Failed to update product");

        let details = service.get_product(id).await.expect("Product missing");
        assert_eq!(details.product.title, new_title);

        let variants: Vec<(VariantId, &str)> = details
            .variants
            .iter()
            .map(|v| (v.variant_id, v.variant.as_str()))
            .collect();
        assert_eq!(variants, vec![(color, "Green / Olive"), (size, "M")]);
        assert_eq!(details.prices.len(), 2);
        assert_eq!(details.prices[0].price, Decimal::new(8900, 2));
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_update_without_collections_keeps_children() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let sku = unique("sku");

    let id = service
        .create_product(
            &submission(
                "Scarf",
                &sku,
                Some(vec![(color, vec!["Red"])]),
                Some(vec![(1500, 7)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    service
        .update_product(id, &submission("Wool scarf", &sku, None, None))
        .await
        .expect("Failed to update product");

    assert_eq!(ctx.child_count("product_variants", id.as_i32()).await, 1);
    assert_eq!(ctx.child_count("product_variant_prices", id.as_i32()).await, 1);

    // Supplied but empty collections clear the rows.
    service
        .update_product(id, &submission("Wool scarf", &sku, Some(vec![]), Some(vec![])))
        .await
        .expect("Failed to update product");

    assert_eq!(ctx.child_count("product_variants", id.as_i32()).await, 0);
    assert_eq!(ctx.child_count("product_variant_prices", id.as_i32()).await, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_update_missing_product_is_not_found() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);

    let err = service
        .update_product(
            ProductId::new(i32::MAX),
            &submission("Ghost", &unique("sku"), None, None),
        )
        .await
        .expect_err("Missing product must fail");

    assert!(matches!(
        err,
        SyncError::Repository(RepositoryError::NotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_failed_update_rolls_back_everything() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let sku = unique("sku");

    let id = service
        .create_product(
            &submission(
                "Boots",
                &sku,
                Some(vec![(color, vec!["Brown"])]),
                Some(vec![(12000, 3)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    // Variants are replaced before prices; the bad axis fails mid-way.
    let err = service
        .update_product(
            id,
            &submission(
                "Renamed boots",
                &sku,
                Some(vec![(VariantId::new(i32::MAX), vec!["Black"])]),
                Some(vec![(100, 1)]),
            ),
        )
        .await
        .expect_err("Unknown axis must fail");
    assert!(matches!(
        err,
        SyncError::Repository(RepositoryError::Conflict(_))
    ));

    let details = service.get_product(id).await.expect("Product missing");
    assert_eq!(details.product.title, "Boots");
    assert_eq!(details.variants.len(), 1);
    assert_eq!(details.variants[0].variant, "Brown");
    assert_eq!(details.prices[0].price, Decimal::new(12000, 2));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_update_with_tagless_selection_is_rejected() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let sku = unique("sku");

    let id = service
        .create_product(
            &submission("Belt", &sku, Some(vec![(color, vec!["Tan"])]), None),
            None,
        )
        .await
        .expect("Failed to create product");

    let err = service
        .update_product(
            id,
            &submission("Belt", &sku, Some(vec![(color, vec![" "])]), None),
        )
        .await
        .expect_err("Selection without tags must fail");
    assert!(matches!(err, SyncError::Invalid(msg) if msg == "selection 1 has no tags"));

    let details = service.get_product(id).await.expect("Product missing");
    assert_eq!(details.variants.len(), 1);
    assert_eq!(details.variants[0].variant, "Tan");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_concurrent_updates_do_not_interleave() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::PerTag);
    let size = ctx.variant_axis("Size").await;
    let sku = unique("sku");

    let id = service
        .create_product(&submission("Socks", &sku, None, None), None)
        .await
        .expect("Failed to create product");

    let first = submission("Socks A", &sku, Some(vec![(size, vec!["S", "M"])]), None);
    let second = submission("Socks B", &sku, Some(vec![(size, vec!["L", "XL", "XXL"])]), None);

    let (a, b) = tokio::join!(
        service.update_product(id, &first),
        service.update_product(id, &second)
    );
    a.expect("First update failed");
    b.expect("Second update failed");

    let details = service.get_product(id).await.expect("Product missing");
    let tags: Vec<&str> = details.variants.iter().map(|v| v.variant.as_str()).collect();
    match details.product.title.as_str() {
        "Socks A" => assert_eq!(tags, vec!["S", "M"]),
        "Socks B" => assert_eq!(tags, vec!["L", "XL", "XXL"]),
        other => panic!("unexpected title {other}"),
    }
}

// ============================================================================
// List & Filter
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_list_paginates_in_insertion_order() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let prefix = unique("Lamp");

    let mut ids = Vec::new();
    for i in 0..7 {
        let id = service
            .create_product(
                &submission(&format!("{prefix} {i}"), &unique("sku"), None, None),
                None,
            )
            .await
            .expect("Failed to create product");
        ids.push(id);
    }

    let first = service
        .list_products(&title_query(&prefix))
        .await
        .expect("Failed to list products");
    assert_eq!(first.total, 7);
    assert_eq!(first.total_pages(), 2);
    let first_ids: Vec<ProductId> = first.products.iter().map(|p| p.product.id).collect();
    assert_eq!(first_ids, ids[..5]);

    let second = service
        .list_products(&ListQuery {
            page: Some("2".to_string()),
            ..title_query(&prefix)
        })
        .await
        .expect("Failed to list products");
    let second_ids: Vec<ProductId> = second.products.iter().map(|p| p.product.id).collect();
    assert_eq!(second_ids, ids[5..]);
    assert_eq!(second.first_index(), 6);
    assert_eq!(second.last_index(), 7);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_title_filter_is_case_insensitive_and_literal() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let prefix = unique("Kettle");

    service
        .create_product(&submission(&format!("{prefix} 100% Steel"), &unique("sku"), None, None), None)
        .await
        .expect("Failed to create product");
    service
        .create_product(&submission(&format!("{prefix} 1000 Watt"), &unique("sku"), None, None), None)
        .await
        .expect("Failed to create product");

    let upper = service
        .list_products(&title_query(&prefix.to_uppercase()))
        .await
        .expect("Failed to list products");
    assert_eq!(upper.total, 2);

    let percent = service
        .list_products(&title_query(&format!("{prefix} 100%")))
        .await
        .expect("Failed to list products");
    assert_eq!(percent.total, 1);
    assert!(percent.products[0].product.title.ends_with("Steel"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_variant_and_price_filters() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let color = ctx.variant_axis("Color").await;
    let prefix = unique("Chair");

    let cheap = service
        .create_product(
            &submission(
                &format!("{prefix} cheap"),
                &unique("sku"),
                Some(vec![(color, vec!["Red"])]),
                Some(vec![(1000, 1)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");
    service
        .create_product(
            &submission(
                &format!("{prefix} pricey"),
                &unique("sku"),
                None,
                Some(vec![(5000, 1)]),
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    let by_variant = service
        .list_products(&ListQuery {
            variant: Some(color.to_string()),
            ..title_query(&prefix)
        })
        .await
        .expect("Failed to list products");
    assert_eq!(by_variant.total, 1);
    assert_eq!(by_variant.products[0].product.id, cheap);

    let by_price = service
        .list_products(&ListQuery {
            price_from: Some("5".to_string()),
            price_to: Some("20".to_string()),
            ..title_query(&prefix)
        })
        .await
        .expect("Failed to list products");
    assert_eq!(by_price.total, 1);
    assert_eq!(by_price.products[0].product.id, cheap);

    // Inclusive bounds.
    let exact = service
        .list_products(&ListQuery {
            price_from: Some("50".to_string()),
            price_to: Some("50".to_string()),
            ..title_query(&prefix)
        })
        .await
        .expect("Failed to list products");
    assert_eq!(exact.total, 1);

    // One bound alone does not filter.
    let one_bound = service
        .list_products(&ListQuery {
            price_from: Some("20".to_string()),
            ..title_query(&prefix)
        })
        .await
        .expect("Failed to list products");
    assert_eq!(one_bound.total, 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_date_filter_matches_local_day() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let prefix = unique("Vase");

    service
        .create_product(&submission(&prefix, &unique("sku"), None, None), None)
        .await
        .expect("Failed to create product");

    let today = Local::now().date_naive();
    let on = |date: chrono::NaiveDate| ListQuery {
        date: Some(date.format("%Y-%m-%d").to_string()),
        ..title_query(&prefix)
    };

    let hit = service.list_products(&on(today)).await.expect("Failed to list");
    assert_eq!(hit.total, 1);

    let miss = service
        .list_products(&on(today - Duration::days(1)))
        .await
        .expect("Failed to list");
    assert_eq!(miss.total, 0);

    let err = service
        .list_products(&ListQuery {
            date: Some("not-a-date".to_string()),
            ..ListQuery::default()
        })
        .await
        .expect_err("Bad date must fail");
    assert!(matches!(err, SyncError::InvalidFilter(_)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_date_filter_includes_last_fraction_of_day() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::Joined);
    let title = unique("Clock");

    let id = service
        .create_product(&submission(&title, &unique("sku"), None, None), None)
        .await
        .expect("Failed to create product");

    let day = NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date");
    let late = Local
        .from_local_datetime(&day.and_hms_milli_opt(23, 59, 59, 500).expect("valid time"))
        .earliest()
        .expect("local time exists");
    sqlx::query("UPDATE products SET created_at = $1 WHERE id = $2")
        .bind(late)
        .bind(id)
        .execute(&ctx.pool)
        .await
        .expect("Failed to backdate product");

    let on = |date: &str| ListQuery {
        date: Some(date.to_string()),
        ..title_query(&title)
    };

    let same_day = service.list_products(&on("2024-03-09")).await.expect("Failed to list");
    assert_eq!(same_day.total, 1);

    let next_day = service.list_products(&on("2024-03-10")).await.expect("Failed to list");
    assert_eq!(next_day.total, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (CATALOG_TEST_DATABASE_URL)"]
async fn test_variant_groups_list_values_in_use() {
    let ctx = TestContext::new().await;
    let service = ctx.service(VariantLayout::PerTag);
    let material = ctx.variant_axis("Material").await;

    service
        .create_product(
            &submission(
                &unique("Bag"),
                &unique("sku"),
                Some(vec![(material, vec!["Leather", "Canvas"])]),
                None,
            ),
            None,
        )
        .await
        .expect("Failed to create product");

    let groups = service
        .list_variant_groups()
        .await
        .expect("Failed to list variant groups");
    let group = groups
        .iter()
        .find(|g| g.variant.id == material)
        .expect("Axis missing from groups");
    assert_eq!(group.values, vec!["Canvas", "Leather"]);
}
