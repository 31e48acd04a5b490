//! Order engine against a real database.
//!
//! Each test gets a fresh database with the storefront migrations applied.
//! Run with: `DATABASE_URL=... cargo test -p nexora-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashSet;

use sqlx::PgPool;

use nexora_core::{Email, GuestContact, OrderStatus, Price, ProductId, Role, ShippingPolicy, VariantId};
use nexora_integration_tests::{
    create_address, create_product, create_user, identity, order_count, product_stock,
};
use nexora_storefront::db::{CartRepository, OrderRepository, orders};
use nexora_storefront::services::orders::{GuestLine, GuestOrderRequest, OrderError, OrderService};

fn guest_request(items: Vec<GuestLine>) -> GuestOrderRequest {
    GuestOrderRequest {
        contact: GuestContact {
            name: "Rina Wijaya".to_owned(),
            email: Email::parse("rina@example.com").unwrap(),
            phone: "081298765432".to_owned(),
            address: "Jl. Sudirman 5, Jakarta".to_owned(),
        },
        items,
        notes: String::new(),
    }
}

fn line(product_id: ProductId, quantity: i32) -> GuestLine {
    GuestLine {
        product_id,
        variant_id: None,
        quantity,
    }
}

async fn variant_stock(pool: &PgPool, id: VariantId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM product_variants WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_reserves_stock_and_clears_cart(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let address = create_address(&pool, &user).await;
    let product = create_product(&pool, "Batik Tulis Shirt", 100_000, 10, &[]).await;

    CartRepository::new(&pool)
        .add(user.id, product, None, 3)
        .await
        .unwrap();

    let detail = OrderService::new(&pool, &shipping)
        .place_order(&identity(&user), address, "leave at the door")
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.subtotal, Price::from_major(300_000));
    assert_eq!(detail.order.shipping_fee, Price::from_major(15_000));
    assert_eq!(detail.order.total, Price::from_major(315_000));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 3);

    assert_eq!(product_stock(&pool, product).await, 7);
    assert!(CartRepository::new(&pool).lines(user.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_empty_cart_is_rejected(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let address = create_address(&pool, &user).await;

    let err = OrderService::new(&pool, &shipping)
        .place_order(&identity(&user), address, "")
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::EmptyCart));
    assert_eq!(order_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_foreign_address_is_rejected(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let owner = create_user(&pool, "owner@example.com", Role::Customer).await;
    let other = create_user(&pool, "other@example.com", Role::Customer).await;
    let address = create_address(&pool, &owner).await;
    let product = create_product(&pool, "Teak Board", 50_000, 5, &[]).await;

    CartRepository::new(&pool)
        .add(other.id, product, None, 1)
        .await
        .unwrap();

    let err = OrderService::new(&pool, &shipping)
        .place_order(&identity(&other), address, "")
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::AddressNotFound));
    assert_eq!(product_stock(&pool, product).await, 5);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_line_rolls_back_whole_order(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let plenty = create_product(&pool, "Coffee Beans", 95_000, 50, &[]).await;
    let scarce = create_product(&pool, "Limited Print", 400_000, 1, &[]).await;

    let err = OrderService::new(&pool, &shipping)
        .place_guest_order(&guest_request(vec![line(plenty, 2), line(scarce, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InsufficientStock { .. }));
    assert_eq!(product_stock(&pool, plenty).await, 50);
    assert_eq!(product_stock(&pool, scarce).await, 1);
    assert_eq!(order_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_quantity_far_above_stock_is_insufficient_stock(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let camera = create_product(&pool, "Camera", 1_000_000, 5, &[]).await;

    let err = OrderService::new(&pool, &shipping)
        .place_guest_order(&guest_request(vec![line(camera, 2_000_000)]))
        .await
        .unwrap_err();

    match err {
        OrderError::InsufficientStock { product } => assert_eq!(product, "Camera"),
        other => panic!("expected insufficient stock, got {other:?}"),
    }
    assert_eq!(product_stock(&pool, camera).await, 5);
    assert_eq!(order_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_orders_never_oversell(pool: PgPool) {
    let product = create_product(&pool, "Flash Sale Earbuds", 899_000, 3, &[]).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let shipping = ShippingPolicy::default();
            OrderService::new(&pool, &shipping)
                .place_guest_order(&guest_request(vec![line(product, 1)]))
                .await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(OrderError::InsufficientStock { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(product_stock(&pool, product).await, 0);
    assert_eq!(order_count(&pool).await, 3);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_variant_stock_is_reserved_and_restored(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let product = create_product(&pool, "Kebaya Top", 275_000, 30, &[("M", 4), ("L", 2)]).await;
    let size_l: VariantId = sqlx::query_scalar(
        "SELECT id FROM product_variants WHERE product_id = $1 AND value = 'L'",
    )
    .bind(product)
    .fetch_one(&pool)
    .await
    .unwrap();

    let request = guest_request(vec![GuestLine {
        product_id: product,
        variant_id: Some(size_l),
        quantity: 2,
    }]);
    let service = OrderService::new(&pool, &shipping);
    let detail = service.place_guest_order(&request).await.unwrap();

    assert_eq!(variant_stock(&pool, size_l).await, 0);
    assert_eq!(product_stock(&pool, product).await, 28);

    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    service
        .cancel(detail.order.id, &identity(&admin))
        .await
        .unwrap();
    assert_eq!(variant_stock(&pool, size_l).await, 2);
    assert_eq!(product_stock(&pool, product).await, 30);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_restores_stock_once(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let address = create_address(&pool, &user).await;
    let product = create_product(&pool, "Batik Tulis Shirt", 100_000, 10, &[]).await;
    CartRepository::new(&pool)
        .add(user.id, product, None, 4)
        .await
        .unwrap();

    let service = OrderService::new(&pool, &shipping);
    let caller = identity(&user);
    let detail = service.place_order(&caller, address, "").await.unwrap();
    assert_eq!(product_stock(&pool, product).await, 6);

    let cancelled = service.cancel(detail.order.id, &caller).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(product_stock(&pool, product).await, 10);

    let err = service.cancel(detail.order.id, &caller).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotCancellable {
            status: OrderStatus::Cancelled
        }
    ));
    assert_eq!(product_stock(&pool, product).await, 10);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_paid_order_cannot_be_cancelled(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let address = create_address(&pool, &user).await;
    let product = create_product(&pool, "Batik Tulis Shirt", 100_000, 10, &[]).await;
    CartRepository::new(&pool)
        .add(user.id, product, None, 3)
        .await
        .unwrap();

    let service = OrderService::new(&pool, &shipping);
    let caller = identity(&user);
    let detail = service.place_order(&caller, address, "").await.unwrap();
    service
        .update_status(detail.order.id, OrderStatus::Paid, None)
        .await
        .unwrap();

    let err = service.cancel(detail.order.id, &caller).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotCancellable {
            status: OrderStatus::Paid
        }
    ));

    let order = OrderRepository::new(&pool)
        .get(detail.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(product_stock(&pool, product).await, 7);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_other_customers_cannot_cancel(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let product = create_product(&pool, "Teak Board", 185_000, 5, &[]).await;
    let stranger = create_user(&pool, "stranger@example.com", Role::Customer).await;

    let service = OrderService::new(&pool, &shipping);
    let detail = service
        .place_guest_order(&guest_request(vec![line(product, 1)]))
        .await
        .unwrap();

    let err = service
        .cancel(detail.order.id, &identity(&stranger))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
    assert_eq!(product_stock(&pool, product).await, 4);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_cannot_reopen_cancelled_order(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let product = create_product(&pool, "Teak Board", 185_000, 5, &[]).await;

    let service = OrderService::new(&pool, &shipping);
    let detail = service
        .place_guest_order(&guest_request(vec![line(product, 2)]))
        .await
        .unwrap();

    service
        .update_status(detail.order.id, OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(product_stock(&pool, product).await, 5);

    let err = service
        .update_status(detail.order.id, OrderStatus::Processing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
    assert_eq!(product_stock(&pool, product).await, 5);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_guest_order_is_trackable_by_email(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let product = create_product(&pool, "Coffee Beans", 95_000, 20, &[]).await;

    let service = OrderService::new(&pool, &shipping);
    let detail = service
        .place_guest_order(&guest_request(vec![line(product, 1)]))
        .await
        .unwrap();
    let number = &detail.order.order_number;
    assert!(number.starts_with("RW-"), "unexpected order number {number}");

    let found = service
        .track(number, &Email::parse("RINA@example.com").unwrap())
        .await
        .unwrap();
    assert_eq!(found.order.id, detail.order.id);

    let err = service
        .track(number, &Email::parse("someone@example.com").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_numbers_are_unique(pool: PgPool) {
    let shipping = ShippingPolicy::default();
    let product = create_product(&pool, "Coffee Beans", 95_000, 100, &[]).await;

    let service = OrderService::new(&pool, &shipping);
    let mut numbers = HashSet::new();
    for _ in 0..20 {
        let detail = service
            .place_guest_order(&guest_request(vec![line(product, 1)]))
            .await
            .unwrap();
        assert!(numbers.insert(detail.order.order_number));
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_merges_repeated_adds(pool: PgPool) {
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let product = create_product(&pool, "Kebaya Top", 275_000, 30, &[]).await;
    let cart = CartRepository::new(&pool);

    let first = cart.add(user.id, product, None, 1).await.unwrap();
    let second = cart.add(user.id, product, None, 2).await.unwrap();

    assert_eq!(first, second);
    let lines = cart.lines(user.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_keeps_lines_added_after_lock(pool: PgPool) {
    let user = create_user(&pool, "budi@example.com", Role::Customer).await;
    let shirt = create_product(&pool, "Batik Tulis Shirt", 100_000, 10, &[]).await;
    let beans = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let cart = CartRepository::new(&pool);
    cart.add(user.id, shirt, None, 1).await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let locked = orders::lock_cart_lines(&mut tx, user.id).await.unwrap();
    assert_eq!(locked.len(), 1);

    // Another request adds a line while checkout holds the cart.
    cart.add(user.id, beans, None, 2).await.unwrap();

    orders::clear_cart_lines(&mut tx, user.id, &locked)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let remaining = cart.lines(user.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].product_id, beans);
    assert_eq!(remaining[0].quantity, 2);
}
