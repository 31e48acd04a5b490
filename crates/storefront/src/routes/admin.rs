//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`], so non-admin tokens get 403 before
//! any work is done.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use nexora_core::{CategoryId, OrderId, OrderStatus, ProductId, Role, UserId, VariantId};

use crate::db::dashboard::DashboardStats;
use crate::db::{
    CategoryRepository, DashboardRepository, OrderRepository, ProductRepository, UserRepository,
};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{
    Category, CategoryInput, NewProduct, NewVariant, Order, OrderDetail, OrderListEntry,
    ProductDetail, ProductUpdate, ProductVariant, User, VariantUpdate,
};
use crate::routes::{PageQuery, Paginated};
use crate::services::catalog::slugify;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/products", post(create_product))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/products/{id}/variants", post(add_variant))
        .route("/variants/{id}", put(update_variant).delete(delete_variant))
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/orders", get(orders))
        .route("/orders/{id}", get(order))
        .route("/orders/{id}/status", put(update_order_status))
        .route("/users", get(users))
        .route("/users/{id}/role", put(update_role))
}

/// Slug for a new or renamed entity; names without usable characters are
/// rejected.
fn slug_for(name: &str) -> Result<String, AppError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "name must contain letters or digits".to_owned(),
        ));
    }
    Ok(slug)
}

// =============================================================================
// Dashboard
// =============================================================================

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(DashboardRepository::new(state.pool()).stats().await?))
}

// =============================================================================
// Catalog
// =============================================================================

async fn load_product(state: &AppState, id: ProductId) -> Result<ProductDetail, AppError> {
    ProductRepository::new(state.pool())
        .get_detail(&id.to_string(), true)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductDetail>), AppError> {
    product.validate().map_err(AppError::BadRequest)?;
    let slug = slug_for(&product.name)?;

    let id = ProductRepository::new(state.pool())
        .create(&product, &slug)
        .await?;

    tracing::info!(product_id = %id, admin_id = %admin.user_id, "product created");
    Ok((StatusCode::CREATED, Json(load_product(&state, id).await?)))
}

/// PUT /api/admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<ProductDetail>, AppError> {
    update.validate().map_err(AppError::BadRequest)?;
    let slug = update.name.as_deref().map(slug_for).transpose()?;

    ProductRepository::new(state.pool())
        .update(id, &update, slug.as_deref())
        .await?;

    Ok(Json(load_product(&state, id).await?))
}

/// DELETE /api/admin/products/{id}
///
/// Soft delete: order history keeps pointing at the row.
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool()).soft_delete(id).await?;
    tracing::info!(product_id = %id, admin_id = %admin.user_id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/products/{id}/variants
pub async fn add_variant(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(product_id): Path<ProductId>,
    Json(variant): Json<NewVariant>,
) -> Result<(StatusCode, Json<ProductVariant>), AppError> {
    variant.validate().map_err(AppError::BadRequest)?;

    let created = ProductRepository::new(state.pool())
        .add_variant(product_id, &variant)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/variants/{id}
pub async fn update_variant(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<VariantId>,
    Json(update): Json<VariantUpdate>,
) -> Result<Json<ProductVariant>, AppError> {
    if update.stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest(
            "variant stock cannot be negative".to_owned(),
        ));
    }

    let variant = ProductRepository::new(state.pool())
        .update_variant(id, &update)
        .await?;
    Ok(Json(variant))
}

/// DELETE /api/admin/variants/{id}
pub async fn delete_variant(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<VariantId>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool())
        .delete_variant(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let slug = slug_for(&input.name)?;

    let category = CategoryRepository::new(state.pool())
        .create(&input, &slug)
        .await?;
    state.categories().invalidate().await;

    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    let slug = slug_for(&input.name)?;

    let category = CategoryRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    state.categories().invalidate().await;

    Ok(Json(category))
}

/// DELETE /api/admin/categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    state.categories().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

/// GET /api/admin/orders
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderList>>, AppError> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .page(DEFAULT_LIMIT);

    let (orders, total) = OrderRepository::new(state.pool())
        .list_all(query.status, page)
        .await?;
    Ok(Json(Paginated::new(OrderList { orders }, total, page)))
}

/// GET /api/admin/orders/{id}
pub async fn order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(state.orders().detail_for(id, &admin).await?))
}

/// PUT /api/admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders()
        .update_status(id, update.status, update.tracking_number.as_deref())
        .await?;

    tracing::info!(order_id = %id, admin_id = %admin.user_id, status = %order.status, "admin updated order");
    Ok(Json(order))
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

/// GET /api/admin/users
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserList>>, AppError> {
    let page = query.page(DEFAULT_LIMIT);
    let (users, total) = UserRepository::new(state.pool()).list(page).await?;
    Ok(Json(Paginated::new(UserList { users }, total, page)))
}

/// PUT /api/admin/users/{id}/role
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .set_role(id, update.role)
        .await?;

    tracing::info!(user_id = %id, admin_id = %admin.user_id, role = %user.role, "role changed");
    Ok(Json(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_for_rejects_symbol_only_names() {
        assert_eq!(slug_for("Batik Tulis").unwrap(), "batik-tulis");
        assert!(matches!(slug_for("!!!"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_status_update_body() {
        let update: StatusUpdate =
            serde_json::from_str(r#"{"status":"shipped","tracking_number":"JNE123"}"#).unwrap();
        assert_eq!(update.status, OrderStatus::Shipped);
        assert_eq!(update.tracking_number.as_deref(), Some("JNE123"));

        assert!(serde_json::from_str::<RoleUpdate>(r#"{"role":"superuser"}"#).is_err());
    }
}
