//! Category route handlers.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::AppError;
use crate::models::Category;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

/// GET /api/categories
///
/// Served from the in-process cache; admin writes invalidate it.
pub async fn index(State(state): State<AppState>) -> Result<Json<CategoryList>, AppError> {
    let categories = state.categories().list(state.pool()).await?;
    Ok(Json(CategoryList {
        categories: categories.as_ref().clone(),
    }))
}
