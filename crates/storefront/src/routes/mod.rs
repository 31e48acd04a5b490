//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST /api/auth/register            - Create an account, returns {token, user}
//! POST /api/auth/login               - Password sign-in
//! GET  /api/auth/google              - Redirect to Google consent
//! GET  /api/auth/google/callback     - Finish Google sign-in, redirect to frontend
//! GET  /api/auth/me                  - Current user
//! POST /api/auth/refresh             - Fresh token
//!
//! # Catalog
//! GET  /api/products                 - Filtered product listing
//! GET  /api/products/{id_or_slug}    - Product detail
//! GET  /api/categories               - Category list (cached)
//!
//! # Cart & wishlist (requires auth)
//! GET|POST|DELETE /api/cart
//! PUT|DELETE      /api/cart/{item_id}
//! GET|POST        /api/wishlist
//! DELETE          /api/wishlist/{product_id}
//!
//! # Orders (requires auth)
//! GET|POST /api/orders
//! GET      /api/orders/{id}
//! POST     /api/orders/{id}/cancel
//!
//! # Guest checkout (rate limited)
//! POST /api/guest/order
//! POST /api/guest/track
//! POST /api/guest/payment/{order_id}
//!
//! # Payments
//! POST /api/payments/create/{order_id}
//! GET  /api/payments/status/{order_id}
//! POST /api/payments/notification    - Processor webhook (signature checked)
//! POST /api/payments/simulate/{order_id}
//! GET  /api/payments/config
//!
//! # Account (requires auth)
//! GET|PUT     /api/users/profile
//! GET|POST    /api/users/addresses
//! PUT|DELETE  /api/users/addresses/{id}
//! POST        /api/users/reviews
//!
//! # Admin (requires admin role)
//! GET  /api/admin/dashboard
//! ...  /api/admin/{products,variants,categories,orders,users}
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod guest;
pub mod oauth;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::db::Page;
use crate::middleware::{api_rate_limiter, auth_rate_limiter, create_session_layer};
use crate::state::AppState;

/// `?page=&limit=` query parameters shared by paginated listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    #[must_use]
    pub fn page(&self, default_limit: i64) -> Page {
        Page::new(self.page, self.limit, default_limit)
    }
}

/// A page of results plus the counters the frontend paginates with.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    #[serde(flatten)]
    pub items: T,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl<T> Paginated<T> {
    pub const fn new(items: T, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            pages: page.pages_for(total),
        }
    }
}

/// Create the password auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/me", get(auth::me))
        .route("/refresh", post(auth::refresh))
}

/// Create the Google sign-in routes router.
///
/// The only routes that need a server-side session (for the OAuth `state`).
pub fn oauth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(oauth::start))
        .route("/callback", get(oauth::callback))
        .layer(create_session_layer(state.pool(), state.config()))
        .layer(auth_rate_limiter())
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id_or_slug}", get(products::show))
        .route("/categories", get(categories::index))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{item_id}", put(cart::update).delete(cart::remove))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show).post(wishlist::add))
        .route("/{product_id}", axum::routing::delete(wishlist::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the guest checkout routes router.
pub fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/order", post(guest::create_order))
        .route("/track", post(guest::track))
        .route("/payment/{order_id}", post(guest::create_payment))
        .layer(api_rate_limiter())
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create/{order_id}", post(payments::create))
        .route("/status/{order_id}", get(payments::status))
        .route("/notification", post(payments::notification))
        .route("/simulate/{order_id}", post(payments::simulate))
        .route("/config", get(payments::config))
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(users::profile).put(users::update_profile))
        .route(
            "/addresses",
            get(users::addresses).post(users::create_address),
        )
        .route(
            "/addresses/{id}",
            put(users::update_address).delete(users::delete_address),
        )
        .route("/reviews", post(users::create_review))
}

/// Create all `/api` routes.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .nest("/auth/google", oauth_routes(state))
        .nest("/auth", auth_routes())
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/orders", order_routes())
        .nest("/guest", guest_routes())
        .nest("/payments", payment_routes())
        .nest("/users", user_routes())
        .nest("/admin", admin::routes());

    Router::new().nest("/api", api)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_flattens_items() {
        #[derive(Serialize)]
        struct Items {
            orders: Vec<u32>,
        }

        let page = Page::new(Some(2), Some(10), 10);
        let body = serde_json::to_value(Paginated::new(Items { orders: vec![1, 2] }, 25, page))
            .unwrap();

        assert_eq!(body["orders"], serde_json::json!([1, 2]));
        assert_eq!(body["total"], 25);
        assert_eq!(body["page"], 2);
        assert_eq!(body["limit"], 10);
        assert_eq!(body["pages"], 3);
    }
}
