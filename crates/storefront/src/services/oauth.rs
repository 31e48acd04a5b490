//! Google sign-in.
//!
//! Authorization-code flow: redirect to the consent page, exchange the code
//! on callback, read the userinfo profile and map it onto a local account.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nexora_core::{Email, Role};

use super::auth::{AuthError, AuthService, AuthSession, TokenSigner};
use crate::config::GoogleOAuthConfig;
use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Length of the CSRF `state` parameter.
pub const STATE_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum OAuthError {
    /// Google credentials are not configured.
    #[error("google sign-in is not configured")]
    NotConfigured,

    /// Callback `state` did not match the one stored in the session.
    #[error("invalid oauth state")]
    StateMismatch,

    /// The provider refused the code or sent an unusable response.
    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Profile came back without a usable email address.
    #[error("google account has no usable email")]
    MissingEmail,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<RepositoryError> for OAuthError {
    fn from(err: RepositoryError) -> Self {
        Self::Auth(AuthError::Repository(err))
    }
}

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
}

impl GoogleClient {
    /// # Errors
    ///
    /// Returns `OAuthError::Http` if the HTTP client cannot be built.
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            inner: Arc::new(GoogleClientInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_url: config.redirect_url.clone(),
            }),
        })
    }

    /// Consent page URL for the given CSRF `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?\
            client_id={}&\
            redirect_uri={}&\
            response_type=code&\
            scope=email%20profile&\
            state={}",
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.redirect_url),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code and fetch the user's profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Exchange` if Google rejects the code.
    #[instrument(skip(self, code))]
    pub async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.inner.redirect_url.as_str()),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "google token exchange rejected");
            return Err(OAuthError::Exchange(format!("status {status}")));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let response = self
            .inner
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OAuthError::Exchange(format!(
                "userinfo status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))
    }
}

/// Generate a random alphanumeric `state` value.
#[must_use]
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Compare the callback `state` with the one stored in the session.
///
/// # Errors
///
/// Returns `OAuthError::StateMismatch` if either is missing or they differ.
pub fn check_state(stored: Option<&str>, returned: Option<&str>) -> Result<(), OAuthError> {
    match (stored, returned) {
        (Some(stored), Some(returned))
            if !stored.is_empty()
                && super::payments::signature::constant_time_compare(stored, returned) =>
        {
            Ok(())
        }
        _ => Err(OAuthError::StateMismatch),
    }
}

/// Map a Google profile onto a local account and issue a token.
///
/// Lookup order: the linked Google id, then an existing account with the
/// same email (which gets linked), otherwise a new customer.
///
/// # Errors
///
/// Returns `OAuthError::MissingEmail` if the profile has no email.
#[instrument(skip(pool, signer, profile), fields(google_id = %profile.id))]
pub async fn sign_in(
    pool: &PgPool,
    signer: &TokenSigner,
    profile: &GoogleProfile,
) -> Result<AuthSession, OAuthError> {
    let users = UserRepository::new(pool);
    let user = resolve_account(&users, profile).await?;
    Ok(AuthService::new(pool, signer).session_for(user)?)
}

async fn resolve_account(
    users: &UserRepository<'_>,
    profile: &GoogleProfile,
) -> Result<User, OAuthError> {
    if let Some(user) = users.get_by_google_id(&profile.id).await? {
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .ok_or(OAuthError::MissingEmail)
        .and_then(|e| Email::parse(e).map_err(|_| OAuthError::MissingEmail))?;

    if let Some(existing) = users.get_by_email(&email).await? {
        tracing::info!(user_id = %existing.id, "linking google account to existing user");
        return Ok(users
            .link_google(existing.id, &profile.id, profile.picture.as_deref())
            .await?);
    }

    let name = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.as_str().split('@').next().unwrap_or("Customer"));

    let user = users
        .create(&NewUser {
            email: &email,
            name,
            password_hash: None,
            google_id: Some(&profile.id),
            avatar_url: profile.picture.as_deref(),
            role: Role::Customer,
        })
        .await?;
    tracing::info!(user_id = %user.id, "customer registered via google");
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(&GoogleOAuthConfig {
            client_id: "client-123.apps.googleusercontent.com".to_owned(),
            client_secret: SecretString::from("shh".to_owned()),
            redirect_url: "http://localhost:8080/api/auth/google/callback".to_owned(),
        })
        .unwrap()
    }

    #[test]
    fn test_authorization_url_encodes_params() {
        let url = client().authorization_url("abc123");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client-123.apps.googleusercontent.com"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=email%20profile"));
        assert!(url.ends_with("state=abc123"));
    }

    #[test]
    fn test_generate_state_is_alphanumeric() {
        let a = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, generate_state());
    }

    #[test]
    fn test_check_state() {
        assert!(check_state(Some("abc"), Some("abc")).is_ok());
        assert!(matches!(
            check_state(Some("abc"), Some("abd")),
            Err(OAuthError::StateMismatch)
        ));
        assert!(matches!(
            check_state(None, Some("abc")),
            Err(OAuthError::StateMismatch)
        ));
        assert!(matches!(
            check_state(Some("abc"), None),
            Err(OAuthError::StateMismatch)
        ));
    }
}
