//! Cart route handlers.
//!
//! Lines are always re-priced from the catalog when read; quantities are
//! merged on add.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use nexora_core::{CartItemId, ProductId, VariantId};

use crate::db::CartRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::state::AppState;

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Update quantity request.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartItemCreated {
    pub id: CartItemId,
}

fn check_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<CartView>, AppError> {
    let lines = CartRepository::new(state.pool())
        .lines(identity.user_id)
        .await?;
    Ok(Json(CartView::new(lines)))
}

/// POST /api/cart
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItemCreated>), AppError> {
    check_quantity(request.quantity)?;

    let id = CartRepository::new(state.pool())
        .add(
            identity.user_id,
            request.product_id,
            request.variant_id,
            request.quantity,
        )
        .await?;

    tracing::debug!(cart_item_id = %id, product_id = %request.product_id, "added to cart");
    Ok((StatusCode::CREATED, Json(CartItemCreated { id })))
}

/// PUT /api/cart/{item_id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(item_id): Path<CartItemId>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<StatusCode, AppError> {
    check_quantity(request.quantity)?;

    CartRepository::new(state.pool())
        .set_quantity(identity.user_id, item_id, request.quantity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/cart/{item_id}
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<StatusCode, AppError> {
    CartRepository::new(state.pool())
        .remove(identity.user_id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<StatusCode, AppError> {
    CartRepository::new(state.pool())
        .clear(identity.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
