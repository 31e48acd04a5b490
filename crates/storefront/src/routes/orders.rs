//! Order route handlers for signed-in customers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use nexora_core::{AddressId, OrderId};

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderDetail, OrderListEntry};
use crate::routes::{PageQuery, Paginated};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;

/// Checkout request: the cart is taken from the server side.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderListEntry>,
}

/// GET /api/orders
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<OrderList>>, AppError> {
    let page = query.page(DEFAULT_LIMIT);
    let (orders, total) = state.orders().list_for(identity.user_id, page).await?;
    Ok(Json(Paginated::new(OrderList { orders }, total, page)))
}

/// POST /api/orders
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    add_breadcrumb("checkout", "Placing order from cart", None);

    let detail = state
        .orders()
        .place_order(&identity, request.address_id, request.notes.trim())
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/orders/{id}
///
/// Owner or admin; anyone else gets 404.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(state.orders().detail_for(id, &identity).await?))
}

/// POST /api/orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    add_breadcrumb("order", "Cancelling order", Some(&[("order_id", id.to_string().as_str())]));
    Ok(Json(state.orders().cancel(id, &identity).await?))
}
