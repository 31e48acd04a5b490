//! Account route handlers: profile, address book and reviews.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use nexora_core::AddressId;

use crate::db::{AddressRepository, ReviewRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput, NewReview, Review, User};
use crate::state::AppState;

/// Profile update; omitted fields stay unchanged.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::BadRequest("name cannot be empty".to_owned()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct AddressList {
    pub addresses: Vec<Address>,
}

/// GET /api/users/profile
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_owned()))?;
    Ok(Json(user))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    update.validate()?;

    let user = UserRepository::new(state.pool())
        .update_profile(
            identity.user_id,
            update.name.as_deref().map(str::trim),
            update.avatar_url.as_deref(),
        )
        .await?;
    Ok(Json(user))
}

/// GET /api/users/addresses
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<AddressList>, AppError> {
    let addresses = AddressRepository::new(state.pool())
        .list(identity.user_id)
        .await?;
    Ok(Json(AddressList { addresses }))
}

/// POST /api/users/addresses
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let address = AddressRepository::new(state.pool())
        .create(identity.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/users/addresses/{id}
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>, AppError> {
    input.validate().map_err(AppError::BadRequest)?;

    let address = AddressRepository::new(state.pool())
        .update(id, identity.user_id, &input)
        .await?;
    Ok(Json(address))
}

/// DELETE /api/users/addresses/{id}
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    AddressRepository::new(state.pool())
        .delete(id, identity.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/reviews
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    review.validate().map_err(AppError::BadRequest)?;

    let created = ReviewRepository::new(state.pool())
        .create(identity.user_id, &review)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_rejects_blank_name() {
        let update = ProfileUpdate {
            name: Some("   ".to_owned()),
            avatar_url: None,
        };
        assert!(matches!(update.validate(), Err(AppError::BadRequest(_))));

        let update = ProfileUpdate {
            name: None,
            avatar_url: Some("https://cdn.example.com/a.png".to_owned()),
        };
        assert!(update.validate().is_ok());
    }
}
