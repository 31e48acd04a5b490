//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use nexora_core::ProductId;

use crate::db::WishlistRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::WishlistEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToWishlistRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct Wishlist {
    pub items: Vec<WishlistEntry>,
}

/// GET /api/wishlist
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Wishlist>, AppError> {
    let items = WishlistRepository::new(state.pool())
        .list(identity.user_id)
        .await?;
    Ok(Json(Wishlist { items }))
}

/// POST /api/wishlist
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<AddToWishlistRequest>,
) -> Result<StatusCode, AppError> {
    WishlistRepository::new(state.pool())
        .add(identity.user_id, request.product_id)
        .await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/wishlist/{product_id}
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    WishlistRepository::new(state.pool())
        .remove(identity.user_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
