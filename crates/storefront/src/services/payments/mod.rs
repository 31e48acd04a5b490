//! Payment gateway adapter.
//!
//! Opens hosted checkout sessions for pending orders and reconciles the
//! processor's signed notifications against local payment and order rows.
//! Payments only ever leave `pending` once, which makes replays harmless.

pub mod midtrans;
pub mod signature;

pub use midtrans::{MidtransClient, PaymentGatewayError, SnapRequest, SnapSession};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use nexora_core::{OrderId, OrderStatus, PaymentStatus, TransactionStatus};

use super::orders::{self, OrderError};
use crate::config::{MidtransConfig, PaymentFailurePolicy};
use crate::db::payments::{self as payment_rows, NewPayment};
use crate::db::{OrderRepository, PaymentRepository, RepositoryError, UserRepository};
use crate::db::orders as order_rows;
use crate::models::{Identity, Order, Payment};

/// Method recorded for sandbox settlements.
pub const SIMULATION_METHOD: &str = "simulation";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("order not found")]
    OrderNotFound,

    #[error("payment not found")]
    PaymentNotFound,

    #[error("order is {status}, only pending orders can be paid")]
    OrderNotPending { status: OrderStatus },

    #[error("invalid notification signature")]
    InvalidSignature,

    #[error("payment simulation is disabled in production")]
    SimulationDisabled,

    #[error(transparent)]
    Gateway(#[from] PaymentGatewayError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Session handed to the client to open the hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub snap_token: String,
    pub redirect_url: String,
}

/// Asynchronous notification from the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub payment_type: Option<String>,
}

/// What a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The payment moved to this status.
    Applied(PaymentStatus),
    /// The payment had already left `pending`.
    AlreadySettled,
    /// Status carries no transition (`pending`, unknown values).
    Acknowledged,
}

/// Processor-side order id: unique per attempt.
#[must_use]
pub fn external_order_id(prefix: &str, order_id: OrderId, unix_seconds: i64) -> String {
    format!("{prefix}-{}-{unix_seconds}", order_id.short())
}

pub struct PaymentService<'a> {
    pool: &'a PgPool,
    gateway: &'a MidtransClient,
    config: &'a MidtransConfig,
    frontend_url: &'a str,
    failure_policy: PaymentFailurePolicy,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a MidtransClient,
        config: &'a MidtransConfig,
        frontend_url: &'a str,
        failure_policy: PaymentFailurePolicy,
    ) -> Self {
        Self {
            pool,
            gateway,
            config,
            frontend_url,
            failure_policy,
        }
    }

    /// Open (or reuse) a checkout session for the caller's pending order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` for missing or foreign orders,
    /// `OrderNotPending` unless the order is pending, and `Gateway` when the
    /// processor fails.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn create_for_user(
        &self,
        order_id: OrderId,
        identity: &Identity,
    ) -> Result<CheckoutSession, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get_visible(order_id, identity.user_id, false)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        let user = UserRepository::new(self.pool)
            .get_by_id(identity.user_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        self.open_session(&order, &user.name, user.email.as_str())
            .await
    }

    /// Open (or reuse) a checkout session for a guest order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` unless the order is a guest
    /// order, plus the errors of [`Self::create_for_user`].
    #[instrument(skip(self))]
    pub async fn create_for_guest(&self, order_id: OrderId) -> Result<CheckoutSession, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        let contact = order
            .purchaser
            .guest()
            .cloned()
            .ok_or(PaymentError::OrderNotFound)?;

        self.open_session(&order, &contact.name, contact.email.as_str())
            .await
    }

    async fn open_session(
        &self,
        order: &Order,
        customer_name: &str,
        customer_email: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        if order.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPending {
                status: order.status,
            });
        }

        let payments = PaymentRepository::new(self.pool);
        if let Some(existing) = payments.latest_for_order(order.id).await?
            && let Some((token, url)) = existing.live_session()
        {
            tracing::debug!(payment_id = %existing.id, "reusing live checkout session");
            return Ok(CheckoutSession {
                snap_token: token.to_owned(),
                redirect_url: url.to_owned(),
            });
        }

        let external_id =
            external_order_id(&self.config.order_prefix, order.id, Utc::now().timestamp());
        let finish_url = format!(
            "{}/orders/{}",
            self.frontend_url.trim_end_matches('/'),
            order.id
        );

        let session = self
            .gateway
            .create_session(&SnapRequest {
                order_id: &external_id,
                gross_amount: order.total.whole_units(),
                customer_name,
                customer_email,
                finish_url: &finish_url,
            })
            .await?;

        let payment = payments
            .create(&NewPayment {
                order_id: order.id,
                external_order_id: &external_id,
                amount: order.total,
                snap_token: &session.token,
                redirect_url: &session.redirect_url,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.id,
            external_order_id = %external_id,
            "checkout session created"
        );
        Ok(CheckoutSession {
            snap_token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    /// Latest payment of one of the caller's orders.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` or `PaymentNotFound`.
    pub async fn status(
        &self,
        order_id: OrderId,
        identity: &Identity,
    ) -> Result<Payment, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get_visible(order_id, identity.user_id, false)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        PaymentRepository::new(self.pool)
            .latest_for_order(order.id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)
    }

    /// Reconcile a processor notification.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` for a bad signature, with
    /// nothing touched, and `PaymentNotFound` for an unknown session id.
    #[instrument(
        skip(self, notification),
        fields(
            external_order_id = %notification.order_id,
            transaction_status = %notification.transaction_status
        )
    )]
    pub async fn handle_notification(
        &self,
        notification: &Notification,
    ) -> Result<NotificationOutcome, PaymentError> {
        if !signature::verify_notification(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            &notification.signature_key,
            &self.config.server_key,
        ) {
            tracing::warn!("rejected notification with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let mut tx = self.pool.begin().await?;

        let payment = payment_rows::lock_by_external_id(&mut tx, &notification.order_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)?;

        let transaction_status = TransactionStatus::from_wire(&notification.transaction_status);
        let Some(target) = transaction_status.settles_as() else {
            tracing::debug!("notification acknowledged without transition");
            return Ok(NotificationOutcome::Acknowledged);
        };

        let outcome = self
            .settle(&mut tx, &payment, target, notification.payment_type.as_deref())
            .await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Mark the latest pending payment successful without the processor.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::SimulationDisabled` in production, otherwise
    /// `OrderNotFound` or `PaymentNotFound`.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn simulate(
        &self,
        order_id: OrderId,
        identity: &Identity,
    ) -> Result<NotificationOutcome, PaymentError> {
        if !self.config.allows_simulation() {
            return Err(PaymentError::SimulationDisabled);
        }

        let order = OrderRepository::new(self.pool)
            .get_visible(order_id, identity.user_id, identity.is_admin())
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        let mut tx = self.pool.begin().await?;

        let latest = payment_rows::latest_for_order(&mut tx, order.id)
            .await?
            .filter(|p| p.status == PaymentStatus::Pending)
            .ok_or(PaymentError::PaymentNotFound)?;
        let payment = payment_rows::lock_by_external_id(&mut tx, &latest.external_order_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)?;

        let outcome = self
            .settle(&mut tx, &payment, PaymentStatus::Success, Some(SIMULATION_METHOD))
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "payment simulated");
        Ok(outcome)
    }

    /// Apply a terminal status to a locked payment and its order.
    async fn settle(
        &self,
        conn: &mut PgConnection,
        payment: &Payment,
        target: PaymentStatus,
        method: Option<&str>,
    ) -> Result<NotificationOutcome, PaymentError> {
        let Some(updated) =
            payment_rows::settle_if_pending(conn, &payment.external_order_id, target, method)
                .await?
        else {
            tracing::debug!(payment_id = %payment.id, status = %payment.status, "payment already settled");
            return Ok(NotificationOutcome::AlreadySettled);
        };

        match updated.status {
            PaymentStatus::Success => {
                if !order_rows::mark_paid_if_pending(conn, payment.order_id).await? {
                    let current = order_rows::lock_order(conn, payment.order_id)
                        .await?
                        .map(|o| o.status);
                    if current == Some(OrderStatus::Cancelled) {
                        tracing::warn!(
                            order_id = %payment.order_id,
                            payment_id = %payment.id,
                            "payment settled for a cancelled order, refund needed"
                        );
                    }
                }
            }
            PaymentStatus::Failed | PaymentStatus::Expired => {
                if self.failure_policy == PaymentFailurePolicy::ReleaseStock
                    && orders::release_pending(conn, payment.order_id).await?
                {
                    tracing::info!(
                        order_id = %payment.order_id,
                        status = %updated.status,
                        "order cancelled and stock released after payment failure"
                    );
                }
            }
            PaymentStatus::Pending => {}
        }

        tracing::info!(payment_id = %updated.id, status = %updated.status, "payment settled");
        Ok(NotificationOutcome::Applied(updated.status))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_external_order_id_shape() {
        let id: OrderId = "1a2b3c4d-0000-4000-8000-000000000000"
            .parse()
            .unwrap();
        assert_eq!(
            external_order_id("NEXORA", id, 1_700_000_000),
            "NEXORA-1a2b3c4d-1700000000"
        );
    }

    #[test]
    fn test_notification_payment_type_optional() {
        let n: Notification = serde_json::from_str(
            r#"{"order_id":"NEXORA-1a2b3c4d-1","status_code":"200","gross_amount":"150000.00",
                "signature_key":"abc","transaction_status":"settlement"}"#,
        )
        .unwrap();
        assert!(n.payment_type.is_none());
        assert_eq!(n.transaction_status, "settlement");
    }
}
