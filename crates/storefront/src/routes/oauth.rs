//! Google sign-in route handlers.
//!
//! - Start: stores a random `state` in the session and redirects to Google
//! - Callback: checks `state`, exchanges the code, signs the user in and
//!   hands the bearer token to the frontend through a redirect

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;
use crate::services::oauth::{self, OAuthError};
use crate::state::AppState;

/// Query parameters from the Google callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied consent.
    pub error: Option<String>,
}

/// Redirect to Google's consent page.
///
/// # Route
///
/// `GET /api/auth/google`
pub async fn start(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let google = state.google().ok_or(OAuthError::NotConfigured)?;

    let oauth_state = oauth::generate_state();
    session
        .insert(session_keys::GOOGLE_OAUTH_STATE, &oauth_state)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store OAuth state in session: {e}");
            AppError::Internal("session store unavailable".to_owned())
        })?;

    Ok(Redirect::to(&google.authorization_url(&oauth_state)).into_response())
}

/// Finish Google sign-in.
///
/// Success redirects to `{frontend}/auth/callback?token=...`; any failure
/// redirects to `{frontend}/auth/error?message=...`.
///
/// # Route
///
/// `GET /api/auth/google/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let frontend = state.config().frontend_url.trim_end_matches('/');

    match complete(&state, &session, query).await {
        Ok(token) => Redirect::to(&format!(
            "{frontend}/auth/callback?token={}",
            urlencoding::encode(&token)
        ))
        .into_response(),
        Err(e) => {
            tracing::warn!("Google sign-in failed: {e}");
            Redirect::to(&format!(
                "{frontend}/auth/error?message={}",
                urlencoding::encode(failure_message(&e))
            ))
            .into_response()
        }
    }
}

async fn complete(
    state: &AppState,
    session: &Session,
    query: CallbackQuery,
) -> Result<String, OAuthError> {
    let google = state.google().ok_or(OAuthError::NotConfigured)?;

    if let Some(error) = query.error {
        return Err(OAuthError::Exchange(format!("consent denied: {error}")));
    }

    let stored: Option<String> = session
        .remove(session_keys::GOOGLE_OAUTH_STATE)
        .await
        .ok()
        .flatten();
    oauth::check_state(stored.as_deref(), query.state.as_deref())?;

    let code = query
        .code
        .ok_or_else(|| OAuthError::Exchange("missing authorization code".to_owned()))?;

    let profile = google.fetch_profile(&code).await?;
    let auth = oauth::sign_in(state.pool(), state.tokens(), &profile).await?;

    tracing::info!(user_id = %auth.user.id, "signed in with Google");
    Ok(auth.token)
}

/// Client-facing reason, without provider internals.
const fn failure_message(err: &OAuthError) -> &'static str {
    match err {
        OAuthError::NotConfigured => "Google sign-in is not available",
        OAuthError::StateMismatch => "Sign-in session expired, please try again",
        OAuthError::MissingEmail => "Your Google account has no email address",
        OAuthError::Exchange(_) | OAuthError::Http(_) | OAuthError::Auth(_) => {
            "Google sign-in failed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_hides_provider_detail() {
        let err = OAuthError::Exchange("invalid_grant: code already used".to_owned());
        assert_eq!(failure_message(&err), "Google sign-in failed");
        assert_eq!(
            failure_message(&OAuthError::StateMismatch),
            "Sign-in session expired, please try again"
        );
    }
}
