//! Integration tests for the Nexora storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Router tests (no database needed)
//! cargo test -p nexora-integration-tests
//!
//! # Database tests: each gets a fresh, migrated database
//! DATABASE_URL=postgres://postgres@localhost/nexora \
//!     cargo test -p nexora-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_routing` - Full router through `tower::ServiceExt::oneshot`
//! - `checkout` - Order engine: stock, atomicity, cancellation
//! - `payments` - Notification reconciliation
//!
//! The helpers here build state and fixtures; they panic on failure
//! because they only ever run inside tests.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;

use nexora_core::{AddressId, Email, Price, ProductId, Role};
use nexora_storefront::config::StorefrontConfig;
use nexora_storefront::db::payments::NewPayment;
use nexora_storefront::db::users::NewUser;
use nexora_storefront::db::{AddressRepository, PaymentRepository, ProductRepository, UserRepository};
use nexora_storefront::models::{AddressInput, Identity, NewProduct, NewVariant, Payment, User};
use nexora_storefront::services::catalog::slugify;
use nexora_storefront::services::payments::signature::notification_signature;
use nexora_storefront::services::payments::{MidtransClient, Notification};
use nexora_storefront::state::AppState;

/// Token secret used by every test state.
pub const TEST_JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

/// Processor server key used by every test state.
pub const TEST_SERVER_KEY: &str = "SB-Mid-server-9hQ2kLx7";

/// Nothing listens here; checkout session calls fail fast.
const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9";

/// Configuration for tests, with optional overrides.
pub fn test_config(overrides: &[(&str, &str)]) -> StorefrontConfig {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://postgres@localhost/nexora_test"),
        ("JWT_SECRET", TEST_JWT_SECRET),
        ("MIDTRANS_SERVER_KEY", TEST_SERVER_KEY),
        ("MIDTRANS_CLIENT_KEY", "SB-Mid-client-test"),
        ("FRONTEND_URL", "http://localhost:3000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    for (k, v) in overrides {
        vars.insert((*k).to_owned(), (*v).to_owned());
    }

    StorefrontConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// State around `pool` whose payment gateway is unreachable.
pub fn test_state(pool: PgPool, config: StorefrontConfig) -> AppState {
    let gateway = MidtransClient::with_base_url(&config.midtrans, UNREACHABLE_GATEWAY).unwrap();
    AppState::with_gateway(config, pool, gateway).unwrap()
}

/// Identity as the auth extractors would build it.
pub fn identity(user: &User) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email.as_str().to_owned(),
        role: user.role,
    }
}

/// `Authorization` header value for `user`.
pub fn bearer(state: &AppState, user: &User) -> String {
    format!("Bearer {}", state.tokens().issue(user).unwrap())
}

pub async fn create_user(pool: &PgPool, email: &str, role: Role) -> User {
    let email = Email::parse(email).unwrap();
    UserRepository::new(pool)
        .create(&NewUser {
            email: &email,
            name: "Dewi Lestari",
            password_hash: None,
            google_id: None,
            avatar_url: None,
            role,
        })
        .await
        .unwrap()
}

/// Active product with `stock` units and optional `(value, stock)` sizes.
pub async fn create_product(
    pool: &PgPool,
    name: &str,
    price: i64,
    stock: i32,
    sizes: &[(&str, i32)],
) -> ProductId {
    let product = NewProduct {
        name: name.to_owned(),
        description: String::new(),
        base_price: Decimal::from(price),
        stock,
        category_id: None,
        is_active: true,
        is_featured: false,
        images: vec![format!("https://cdn.example.com/{}.jpg", slugify(name))],
        variants: sizes
            .iter()
            .map(|(value, stock)| NewVariant {
                name: "Size".to_owned(),
                value: (*value).to_owned(),
                price_modifier: Decimal::ZERO,
                stock: *stock,
                sku: None,
            })
            .collect(),
    };
    ProductRepository::new(pool)
        .create(&product, &slugify(name))
        .await
        .unwrap()
}

pub async fn create_address(pool: &PgPool, user: &User) -> AddressId {
    let input = AddressInput {
        label: "Home".to_owned(),
        name: user.name.clone(),
        phone: "081234567890".to_owned(),
        street: "Jl. Merdeka No. 10".to_owned(),
        city: "Bandung".to_owned(),
        state: "Jawa Barat".to_owned(),
        postal_code: "40111".to_owned(),
        country: None,
        is_default: true,
    };
    AddressRepository::new(pool)
        .create(user.id, &input)
        .await
        .unwrap()
        .id
}

pub async fn product_stock(pool: &PgPool, id: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn order_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A pending payment row, as if a checkout session had been opened.
pub async fn open_payment(
    pool: &PgPool,
    order_id: nexora_core::OrderId,
    external_order_id: &str,
    amount: Price,
) -> Payment {
    PaymentRepository::new(pool)
        .create(&NewPayment {
            order_id,
            external_order_id,
            amount,
            snap_token: "snap-token-test",
            redirect_url: "https://app.sandbox.midtrans.com/snap/v4/redirection/test",
        })
        .await
        .unwrap()
}

/// Notification signed with [`TEST_SERVER_KEY`].
pub fn signed_notification(external_order_id: &str, transaction_status: &str) -> Notification {
    let status_code = "200";
    let gross_amount = "150000.00";
    let signature_key = notification_signature(
        external_order_id,
        status_code,
        gross_amount,
        &SecretString::from(TEST_SERVER_KEY),
    );
    Notification {
        order_id: external_order_id.to_owned(),
        status_code: status_code.to_owned(),
        gross_amount: gross_amount.to_owned(),
        signature_key,
        transaction_status: transaction_status.to_owned(),
        payment_type: Some("bank_transfer".to_owned()),
    }
}
