//! Aggregate figures for the admin dashboard.

use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use nexora_core::{OrderStatus, Price};

use super::{OrderRepository, Page, RepositoryError};
use crate::models::OrderListEntry;

const RECENT_ORDERS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: Price,
    pub pending_orders: i64,
    pub recent_orders: Vec<OrderListEntry>,
}

#[derive(sqlx::FromRow)]
struct Counts {
    total_users: i64,
    total_products: i64,
    total_orders: i64,
    total_revenue: Price,
    pending_orders: i64,
}

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let counts: Counts = sqlx::query_as(&format!(
            r"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM products WHERE is_active AND deleted_at IS NULL) AS total_products,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status IN ({})) AS total_revenue,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders
            ",
            revenue_statuses()
        ))
        .fetch_one(self.pool)
        .await?;

        let (recent_orders, _) = OrderRepository::new(self.pool)
            .list_all(None, Page { page: 1, limit: RECENT_ORDERS })
            .await?;

        Ok(DashboardStats {
            total_users: counts.total_users,
            total_products: counts.total_products,
            total_orders: counts.total_orders,
            total_revenue: counts.total_revenue,
            pending_orders: counts.pending_orders,
            recent_orders,
        })
    }
}

/// SQL list of the statuses whose totals count as revenue.
fn revenue_statuses() -> String {
    OrderStatus::REVENUE
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
