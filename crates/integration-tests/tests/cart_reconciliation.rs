//! Cross-engine cart scenarios: guest accumulation, merge-on-login,
//! concurrent merge callers, and merge failure retry.

use std::sync::atomic::Ordering;
use std::time::Duration;

use rust_decimal::Decimal;

use sable_core::{ItemDisplay, ItemId, Price, ProductId, SizeId};
use sable_integration_tests::TestContext;

fn display(name: &str, price: &str) -> ItemDisplay {
    ItemDisplay {
        name: name.to_string(),
        price: Price::new(price.parse::<Decimal>().unwrap()),
        image_url: None,
    }
}

async fn wait_for_merge_post(ctx: &TestContext) {
    for _ in 0..200 {
        if ctx.backend.state.merge_posts.load(Ordering::SeqCst) >= 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("merge POST never arrived");
}

#[tokio::test]
async fn guest_cart_end_to_end_merge() {
    let ctx = TestContext::new();

    // Guest adds product 10 / size 3 / qty 1.
    ctx.cart
        .add(
            ProductId::new(10),
            SizeId::new(3),
            1,
            display("Wool Coat", "120.00"),
        )
        .await
        .unwrap();

    let stored = ctx.stored_guest_cart();
    assert_eq!(stored.len(), 1);
    let line = stored.first().unwrap();
    assert_eq!(line.product_id, ProductId::new(10));
    assert_eq!(line.size_id, SizeId::new(3));
    assert_eq!(line.quantity, 1);
    assert!(line.id.is_local());

    // Login, then drain.
    ctx.sign_in();
    ctx.cart.merge_on_login().await.unwrap();

    // The merge endpoint received exactly the variant triples.
    let bodies = ctx.backend.state.merge_bodies.lock().unwrap();
    assert_eq!(
        *bodies,
        vec![serde_json::json!([
            {"productId": 10, "sizeId": 3, "quantity": 1}
        ])]
    );
    drop(bodies);

    // Guest storage is gone; memory reflects the server's cart.
    assert!(!ctx.guest_cart_key_present());
    let items = ctx.cart.items();
    assert_eq!(items.len(), 1);
    assert!(matches!(items.first().unwrap().id, ItemId::Server(_)));
}

#[tokio::test]
async fn concurrent_merge_callers_collapse_to_one_post() {
    let ctx = TestContext::new();
    for product in [1, 2, 3] {
        ctx.cart
            .add(
                ProductId::new(product),
                SizeId::new(1),
                1,
                display("Tee", "18.00"),
            )
            .await
            .unwrap();
    }
    ctx.sign_in();
    ctx.backend.hold_merges();

    let first = ctx.cart.clone();
    let running = tokio::spawn(async move { first.merge_on_login().await });

    // Second caller arrives while the first POST is held open.
    wait_for_merge_post(&ctx).await;
    ctx.cart.merge_on_login().await.unwrap();
    assert_eq!(ctx.backend.state.merge_posts.load(Ordering::SeqCst), 1);

    ctx.backend.release_merge();
    running.await.unwrap().unwrap();

    assert_eq!(ctx.backend.state.merge_posts.load(Ordering::SeqCst), 1);
    assert!(!ctx.guest_cart_key_present());
    assert_eq!(ctx.cart.items().len(), 3);
}

#[tokio::test]
async fn failed_merge_retries_cleanly() {
    let ctx = TestContext::new();
    for product in [1, 2, 3] {
        ctx.cart
            .add(
                ProductId::new(product),
                SizeId::new(1),
                1,
                display("Tee", "18.00"),
            )
            .await
            .unwrap();
    }
    ctx.sign_in();

    // First attempt fails; guest storage must survive untouched.
    ctx.backend.fail_merges(true);
    ctx.cart.merge_on_login().await.unwrap_err();
    assert_eq!(ctx.stored_guest_cart().len(), 3);

    // User-initiated retry succeeds and drains.
    ctx.backend.fail_merges(false);
    ctx.cart.merge_on_login().await.unwrap();
    assert!(!ctx.guest_cart_key_present());
    assert_eq!(ctx.cart.items().len(), 3);
    assert_eq!(ctx.backend.state.merge_posts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mode_switch_redirects_operations_immediately() {
    let ctx = TestContext::new();

    ctx.cart
        .add(ProductId::new(5), SizeId::new(2), 1, display("Tee", "18.00"))
        .await
        .unwrap();
    assert_eq!(ctx.stored_guest_cart().len(), 1);
    assert!(ctx.backend.server_cart().is_empty());

    // Login mid-session: the very next add goes to the server.
    ctx.sign_in();
    ctx.cart
        .add(ProductId::new(6), SizeId::new(2), 1, display("Tee", "18.00"))
        .await
        .unwrap();
    assert_eq!(ctx.backend.server_cart().len(), 1);
    assert_eq!(ctx.stored_guest_cart().len(), 1);

    // Logout: the engine view clears, storage survives for the guest.
    ctx.sign_out();
    ctx.cart.clear();
    assert!(ctx.cart.items().is_empty());
    assert_eq!(ctx.stored_guest_cart().len(), 1);
    ctx.cart.load().await.unwrap();
    assert_eq!(ctx.cart.items().len(), 1);
}

#[tokio::test]
async fn server_decides_duplicate_merge_semantics() {
    let ctx = TestContext::new();
    ctx.sign_in();

    ctx.cart
        .add(ProductId::new(7), SizeId::new(2), 1, display("Tee", "18.00"))
        .await
        .unwrap();
    ctx.cart
        .add(ProductId::new(7), SizeId::new(2), 2, display("Tee", "18.00"))
        .await
        .unwrap();

    let items = ctx.cart.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items.first().unwrap().quantity, 3);
}
