//! Database operations for the storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `users`, `addresses` - Accounts and shipping addresses
//! - `categories`, `products`, `product_images`, `product_variants`, `reviews` - Catalog
//! - `cart_items`, `wishlists` - Per-user collections
//! - `orders`, `order_items`, `payments` - Purchases
//! - `tower_sessions.session` - Server-side sessions (OAuth state)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p nexora-cli -- migrate
//! ```
//!
//! Queries are plain runtime-checked `sqlx::query_as` calls decoding into
//! `FromRow` row structs, which are then converted into domain models.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use cart::{CartRepository, WishlistRepository};
pub use catalog::{CategoryRepository, ProductRepository, ReviewRepository};
pub use dashboard::DashboardRepository;
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Entity already exists (unique constraint violation).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique_or_db(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Whether an error is a unique violation on the named constraint.
pub(crate) fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
    )
}

/// Page request shared by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Hard upper bound on page size.
    pub const MAX_LIMIT: i64 = 100;

    /// Clamp client-supplied paging values, applying defaults.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(1),
            limit: limit
                .filter(|l| *l >= 1)
                .unwrap_or(default_limit)
                .min(Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub const fn pages_for(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        let page = Page::new(None, None, 12);
        assert_eq!(page, Page { page: 1, limit: 12 });
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(0), Some(1000), 12);
        assert_eq!(page, Page { page: 1, limit: 100 });

        let page = Page::new(Some(3), Some(10), 12);
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn test_pages_for_rounds_up() {
        let page = Page::new(None, Some(10), 10);
        assert_eq!(page.pages_for(0), 0);
        assert_eq!(page.pages_for(10), 1);
        assert_eq!(page.pages_for(11), 2);
    }
}
