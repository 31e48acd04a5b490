//! Guest checkout route handlers: ordering, tracking and paying without
//! an account.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use nexora_core::{Email, GuestContact, OrderId};

use crate::error::{AppError, add_breadcrumb};
use crate::models::OrderDetail;
use crate::services::orders::{GuestLine, GuestOrderRequest};
use crate::services::payments::CheckoutSession;
use crate::state::AppState;

/// Guest order body as sent by the checkout form.
#[derive(Debug, Deserialize)]
pub struct GuestOrderBody {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub guest_address: String,
    pub items: Vec<GuestLine>,
    #[serde(default)]
    pub notes: String,
}

impl GuestOrderBody {
    fn into_request(self) -> Result<GuestOrderRequest, AppError> {
        let email = Email::parse(&self.guest_email)
            .map_err(|e| AppError::BadRequest(format!("guest email: {e}")))?;

        Ok(GuestOrderRequest {
            contact: GuestContact {
                name: self.guest_name.trim().to_owned(),
                email,
                phone: self.guest_phone.trim().to_owned(),
                address: self.guest_address.trim().to_owned(),
            },
            items: self.items,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub order_number: String,
    pub email: String,
}

/// POST /api/guest/order
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<GuestOrderBody>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    add_breadcrumb("checkout", "Placing guest order", None);

    let request = body.into_request()?;
    let detail = state.orders().place_guest_order(&request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// POST /api/guest/track
///
/// The email must match the order's guest email or its account email.
pub async fn track(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<OrderDetail>, AppError> {
    let not_found = || AppError::NotFound("Order not found".to_owned());
    let email = Email::parse(&request.email).map_err(|_| not_found())?;

    Ok(Json(state.orders().track(&request.order_number, &email).await?))
}

/// POST /api/guest/payment/{order_id}
pub async fn create_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<CheckoutSession>, AppError> {
    add_breadcrumb(
        "payment",
        "Opening guest payment",
        Some(&[("order_id", order_id.to_string().as_str())]),
    );
    Ok(Json(state.payments().create_for_guest(order_id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(email: &str) -> GuestOrderBody {
        serde_json::from_value(serde_json::json!({
            "guest_name": "  Siti Rahma ",
            "guest_email": email,
            "guest_phone": "0812345678",
            "guest_address": "Jl. Merdeka 1, Bandung",
            "items": [{ "product_id": "3f0c5a52-8f43-4d0a-9c0e-8a1f7e2b6d11", "quantity": 2 }],
        }))
        .unwrap()
    }

    #[test]
    fn test_guest_body_normalises_contact() {
        let request = body("Siti@Example.COM").into_request().unwrap();
        assert_eq!(request.contact.name, "Siti Rahma");
        assert_eq!(request.contact.email.as_str(), "siti@example.com");
        assert_eq!(request.items.len(), 1);
        assert!(request.notes.is_empty());
    }

    #[test]
    fn test_guest_body_rejects_bad_email() {
        assert!(matches!(
            body("not-an-email").into_request(),
            Err(AppError::BadRequest(_))
        ));
    }
}
