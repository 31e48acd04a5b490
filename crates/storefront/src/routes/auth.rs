//! Password authentication route handlers.
//!
//! Every successful call answers `{token, user}`; the client keeps the
//! token and sends it back as `Authorization: Bearer ...`.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::error::{AppError, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthService, AuthSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/register
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let session = AuthService::new(state.pool(), state.tokens())
        .register(&request.name, &request.email, &request.password)
        .await?;

    set_sentry_user(&session.user.id, Some(session.user.email.as_str()));
    tracing::info!(user_id = %session.user.id, "account registered");
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
#[tracing::instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = AuthService::new(state.pool(), state.tokens())
        .login(&request.email, &request.password)
        .await?;

    set_sentry_user(&session.user.id, Some(session.user.email.as_str()));
    Ok(Json(session))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool(), state.tokens())
        .current_user(&identity)
        .await?;
    Ok(Json(user))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<AuthSession>, AppError> {
    let session = AuthService::new(state.pool(), state.tokens())
        .refresh(&identity)
        .await?;
    Ok(Json(session))
}
