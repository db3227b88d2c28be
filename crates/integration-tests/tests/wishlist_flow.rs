//! Wishlist scenarios: auth gating, toggle round-trips, and the
//! availability resolver feeding cart stock warnings.

use rust_decimal::Decimal;

use sable_core::{ItemDisplay, Price, ProductId, ProductSummary, SizeId, SizeOption};
use sable_integration_tests::TestContext;
use sable_storefront::error::StoreError;

fn product(id: i32) -> ProductSummary {
    ProductSummary {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Price::new("25.00".parse::<Decimal>().unwrap()),
        image_url: None,
    }
}

#[tokio::test]
async fn wishlist_requires_sign_in() {
    let ctx = TestContext::new();

    let err = ctx.wishlist.toggle(&product(4)).await.unwrap_err();
    assert!(matches!(err, StoreError::AuthRequired));

    // Cart, by contrast, falls back to guest storage.
    ctx.cart
        .add(
            ProductId::new(4),
            SizeId::new(1),
            1,
            ItemDisplay {
                name: "Tee".to_string(),
                price: Price::new("18.00".parse::<Decimal>().unwrap()),
                image_url: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(ctx.stored_guest_cart().len(), 1);
}

#[tokio::test]
async fn toggle_round_trip_against_the_server() {
    let ctx = TestContext::new();
    ctx.sign_in();

    ctx.wishlist.toggle(&product(4)).await.unwrap();
    assert!(ctx.wishlist.is_in_wishlist(ProductId::new(4)));

    ctx.wishlist.toggle(&product(4)).await.unwrap();
    assert!(!ctx.wishlist.is_in_wishlist(ProductId::new(4)));
    assert!(ctx.wishlist.is_empty());
}

#[tokio::test]
async fn stock_warnings_follow_the_availability_cache() {
    let ctx = TestContext::new();
    ctx.backend.set_sizes(
        ProductId::new(10),
        vec![
            SizeOption {
                size_id: SizeId::new(1),
                name: "S".to_string(),
                in_stock: true,
            },
            SizeOption {
                size_id: SizeId::new(3),
                name: "L".to_string(),
                in_stock: false,
            },
        ],
    );

    ctx.cart
        .add(
            ProductId::new(10),
            SizeId::new(3),
            1,
            ItemDisplay {
                name: "Coat".to_string(),
                price: Price::new("120.00".parse::<Decimal>().unwrap()),
                image_url: None,
            },
        )
        .await
        .unwrap();
    let items = ctx.cart.items();

    // Before the size set loads, no warning.
    assert!(ctx.resolver.stock_conflicts(&items).await.is_empty());

    // After it loads, the out-of-stock size warns.
    ctx.resolver.prime(&[ProductId::new(10)]).await;
    let conflicts = ctx.resolver.stock_conflicts(&items).await;
    assert_eq!(conflicts, vec![items.first().unwrap().id.clone()]);
}
