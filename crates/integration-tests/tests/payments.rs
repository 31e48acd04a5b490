//! Payment notification reconciliation against a real database.
//!
//! Run with: `DATABASE_URL=... cargo test -p nexora-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use nexora_core::{Email, GuestContact, OrderStatus, PaymentStatus, ProductId, Role, ShippingPolicy};
use nexora_integration_tests::{
    create_product, create_user, identity, open_payment, product_stock, signed_notification,
    test_config, test_state,
};
use nexora_storefront::db::{OrderRepository, PaymentRepository};
use nexora_storefront::models::OrderDetail;
use nexora_storefront::services::orders::{GuestLine, GuestOrderRequest, OrderService};
use nexora_storefront::services::payments::{NotificationOutcome, PaymentError};

async fn guest_order(pool: &PgPool, product: ProductId, quantity: i32) -> OrderDetail {
    let shipping = ShippingPolicy::default();
    OrderService::new(pool, &shipping)
        .place_guest_order(&GuestOrderRequest {
            contact: GuestContact {
                name: "Agus Salim".to_owned(),
                email: Email::parse("agus@example.com").unwrap(),
                phone: "081311112222".to_owned(),
                address: "Jl. Malioboro 1, Yogyakarta".to_owned(),
            },
            items: vec![GuestLine {
                product_id: product,
                variant_id: None,
                quantity,
            }],
            notes: String::new(),
        })
        .await
        .unwrap()
}

async fn order_status(pool: &PgPool, order: &OrderDetail) -> OrderStatus {
    OrderRepository::new(pool)
        .get(order.order.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_settlement_marks_order_paid_once(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;
    open_payment(&pool, order.order.id, "NEXORA-settle-1", order.order.total).await;

    let notification = signed_notification("NEXORA-settle-1", "settlement");
    let first = state.payments().handle_notification(&notification).await.unwrap();
    assert_eq!(first, NotificationOutcome::Applied(PaymentStatus::Success));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Paid);

    let paid_at = PaymentRepository::new(&pool)
        .latest_for_order(order.order.id)
        .await
        .unwrap()
        .unwrap()
        .paid_at;
    assert!(paid_at.is_some());

    let replay = state.payments().handle_notification(&notification).await.unwrap();
    assert_eq!(replay, NotificationOutcome::AlreadySettled);

    let after = PaymentRepository::new(&pool)
        .latest_for_order(order.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status, PaymentStatus::Success);
    assert_eq!(after.paid_at, paid_at);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_late_failure_does_not_undo_success(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;
    open_payment(&pool, order.order.id, "NEXORA-late-1", order.order.total).await;

    state
        .payments()
        .handle_notification(&signed_notification("NEXORA-late-1", "capture"))
        .await
        .unwrap();
    let outcome = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-late-1", "expire"))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::AlreadySettled);
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Paid);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_bad_signature_changes_nothing(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;
    open_payment(&pool, order.order.id, "NEXORA-forged-1", order.order.total).await;

    let mut forged = signed_notification("NEXORA-forged-1", "settlement");
    forged.gross_amount = "1.00".to_owned();

    let err = state.payments().handle_notification(&forged).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_pending_notification_is_acknowledged(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;
    open_payment(&pool, order.order.id, "NEXORA-pending-1", order.order.total).await;

    let outcome = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-pending-1", "pending"))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Acknowledged);
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_session_is_not_found(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));

    let err = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-missing-1", "settlement"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::PaymentNotFound));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_failure_retains_stock_by_default(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 3).await;
    open_payment(&pool, order.order.id, "NEXORA-deny-1", order.order.total).await;

    let outcome = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-deny-1", "deny"))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Applied(PaymentStatus::Failed));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Pending);
    assert_eq!(product_stock(&pool, product).await, 7);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_release_policy_cancels_and_restocks(pool: PgPool) {
    let config = test_config(&[("PAYMENT_FAILURE_STOCK_POLICY", "release")]);
    let state = test_state(pool.clone(), config);
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 3).await;
    open_payment(&pool, order.order.id, "NEXORA-expire-1", order.order.total).await;

    let outcome = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-expire-1", "expire"))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Applied(PaymentStatus::Expired));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Cancelled);
    assert_eq!(product_stock(&pool, product).await, 10);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_settlement_after_cancel_keeps_order_cancelled(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 2).await;
    open_payment(&pool, order.order.id, "NEXORA-cancelled-1", order.order.total).await;

    state
        .orders()
        .update_status(order.order.id, OrderStatus::Cancelled, None)
        .await
        .unwrap();

    let outcome = state
        .payments()
        .handle_notification(&signed_notification("NEXORA-cancelled-1", "settlement"))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Applied(PaymentStatus::Success));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Cancelled);
    assert_eq!(product_stock(&pool, product).await, 10);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_simulation_settles_latest_payment(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[]));
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;
    open_payment(&pool, order.order.id, "NEXORA-sim-1", order.order.total).await;

    let outcome = state
        .payments()
        .simulate(order.order.id, &identity(&admin))
        .await
        .unwrap();

    assert_eq!(outcome, NotificationOutcome::Applied(PaymentStatus::Success));
    assert_eq!(order_status(&pool, &order).await, OrderStatus::Paid);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_simulation_disabled_in_production(pool: PgPool) {
    let state = test_state(pool.clone(), test_config(&[("MIDTRANS_IS_PRODUCTION", "true")]));
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let product = create_product(&pool, "Coffee Beans", 95_000, 10, &[]).await;
    let order = guest_order(&pool, product, 1).await;

    let err = state
        .payments()
        .simulate(order.order.id, &identity(&admin))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::SimulationDisabled));
}
