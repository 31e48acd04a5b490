//! Authentication extractors.
//!
//! Bearer tokens arrive as `Authorization: Bearer <token>` and are verified
//! against the state's signer. Handlers receive the caller as an explicit
//! [`Identity`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::Identity;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", identity.email)
/// }
/// ```
pub struct RequireAuth(pub Identity);

/// Extractor that requires a valid bearer token with the admin role.
pub struct RequireAdmin(pub Identity);

/// Extractor that verifies a bearer token when one is present.
///
/// A present but invalid token is still rejected.
pub struct OptionalAuth(pub Option<Identity>);

/// Token from the `Authorization` header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

fn verify(parts: &Parts, state: &AppState) -> Result<Option<Identity>, AppError> {
    let Some(token) = bearer_token(parts) else {
        return Ok(None);
    };
    let identity = state.tokens().verify(token)?.identity();
    set_sentry_user(&identity.user_id, Some(&identity.email));
    tracing::Span::current().record("user_id", tracing::field::display(identity.user_id));
    Ok(Some(identity))
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authorization required".to_owned()))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_owned()));
        }
        Ok(Self(identity))
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(verify(parts, state)?))
    }
}
