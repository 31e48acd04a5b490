//! Payment route handlers.
//!
//! Checkout sessions are opened against the hosted payment page; the
//! processor reports back through the notification webhook, which is the
//! only unauthenticated write here and is guarded by its signature.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::{Value, json};

use nexora_core::{OrderId, PaymentStatus};

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Payment;
use crate::services::payments::{CheckoutSession, Notification, NotificationOutcome};
use crate::state::AppState;

/// Public processor settings for the frontend's payment widget.
#[derive(Debug, Serialize)]
pub struct PaymentConfig {
    pub client_key: Option<String>,
    pub is_production: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationResult {
    pub status: PaymentStatus,
    /// `false` when the payment was already settled.
    pub applied: bool,
}

/// POST /api/payments/create/{order_id}
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<CheckoutSession>, AppError> {
    add_breadcrumb(
        "payment",
        "Opening checkout session",
        Some(&[("order_id", order_id.to_string().as_str())]),
    );
    Ok(Json(
        state.payments().create_for_user(order_id, &identity).await?,
    ))
}

/// GET /api/payments/status/{order_id}
pub async fn status(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.payments().status(order_id, &identity).await?))
}

/// POST /api/payments/notification
///
/// Processor webhook. Replays are acknowledged without side effects.
pub async fn notification(
    State(state): State<AppState>,
    Json(notification): Json<Notification>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.payments().handle_notification(&notification).await?;

    match outcome {
        NotificationOutcome::Applied(status) => {
            tracing::info!(
                external_order_id = %notification.order_id,
                %status,
                "payment notification applied"
            );
        }
        NotificationOutcome::AlreadySettled => {
            tracing::info!(
                external_order_id = %notification.order_id,
                "duplicate payment notification ignored"
            );
        }
        NotificationOutcome::Acknowledged => {}
    }

    Ok(Json(json!({ "status": "ok" })))
}

/// POST /api/payments/simulate/{order_id}
///
/// Sandbox only: settles the latest pending payment as if the processor
/// had confirmed it.
pub async fn simulate(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<SimulationResult>, AppError> {
    let outcome = state.payments().simulate(order_id, &identity).await?;

    let result = match outcome {
        NotificationOutcome::Applied(status) => SimulationResult {
            status,
            applied: true,
        },
        NotificationOutcome::AlreadySettled | NotificationOutcome::Acknowledged => {
            SimulationResult {
                status: PaymentStatus::Success,
                applied: false,
            }
        }
    };
    Ok(Json(result))
}

/// GET /api/payments/config
pub async fn config(State(state): State<AppState>) -> Json<PaymentConfig> {
    let midtrans = &state.config().midtrans;
    Json(PaymentConfig {
        client_key: midtrans.client_key.clone(),
        is_production: midtrans.is_production,
    })
}
