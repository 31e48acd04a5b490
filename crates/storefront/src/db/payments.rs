//! Payment records.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use nexora_core::{OrderId, PaymentStatus, Price};

use super::RepositoryError;
use crate::models::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, external_order_id, status, amount, method, \
     snap_token, redirect_url, paid_at, created_at, updated_at";

/// Fields of a new checkout session.
pub struct NewPayment<'a> {
    pub order_id: OrderId,
    pub external_order_id: &'a str,
    pub amount: Price,
    pub snap_token: &'a str,
    pub redirect_url: &'a str,
}

pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Most recent payment of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn latest_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        latest_for_order(&mut *conn, order_id).await
    }

    /// Record a new pending payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the external id is taken.
    #[instrument(skip(self, new), fields(order_id = %new.order_id))]
    pub async fn create(&self, new: &NewPayment<'_>) -> Result<Payment, RepositoryError> {
        sqlx::query_as(&format!(
            r"
            INSERT INTO payments (order_id, external_order_id, amount, snap_token, redirect_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(new.order_id)
        .bind(new.external_order_id)
        .bind(new.amount)
        .bind(new.snap_token)
        .bind(new.redirect_url)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "payment reference already used"))
    }
}

/// Most recent payment of an order, inside an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn latest_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as(&format!(
        r"
        SELECT {PAYMENT_COLUMNS}
        FROM payments
        WHERE order_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Lock a payment by the processor's order id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_external_id(
    conn: &mut PgConnection,
    external_order_id: &str,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE external_order_id = $1 FOR UPDATE"
    ))
    .bind(external_order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Move a payment out of `pending`.
///
/// Returns `None` when the payment had already left `pending`, which makes
/// replayed notifications no-ops.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn settle_if_pending(
    conn: &mut PgConnection,
    external_order_id: &str,
    status: PaymentStatus,
    method: Option<&str>,
) -> Result<Option<Payment>, RepositoryError> {
    let payment = sqlx::query_as(&format!(
        r"
        UPDATE payments
        SET status = $2,
            method = COALESCE($3, method),
            paid_at = CASE WHEN $2 = 'success'::payment_status THEN NOW() ELSE paid_at END,
            updated_at = NOW()
        WHERE external_order_id = $1 AND status = 'pending'
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(external_order_id)
    .bind(status)
    .bind(method)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
