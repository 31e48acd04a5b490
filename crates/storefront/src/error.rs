//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`, rendered as `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::{AuthError, TokenError};
use crate::services::oauth::OAuthError;
use crate::services::orders::OrderError;
use crate::services::payments::{PaymentError, PaymentGatewayError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bearer token rejected.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Google sign-in failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Order engine refused or failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Payment adapter refused or failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Duplicate resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";

impl AppError {
    /// HTTP status and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => auth(err),
            Self::Token(err) => token(err),
            Self::OAuth(err) => oauth(err),
            Self::Order(err) => order(err),
            Self::Payment(err) => payment(err),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down".to_owned(),
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned()),
        }
    }
}

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_owned()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
        }
    }
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_owned()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::MissingName => (StatusCode::BAD_REQUEST, err.to_string()),
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_owned())
        }
        AuthError::PasswordNotSet => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, err.to_string()),
        AuthError::Repository(inner) => repository(inner),
        AuthError::PasswordHash | AuthError::Token(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned())
        }
    }
}

fn token(err: &TokenError) -> (StatusCode, String) {
    match err {
        TokenError::Encoding => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned()),
        TokenError::Expired => (StatusCode::UNAUTHORIZED, "Token expired".to_owned()),
        TokenError::Malformed | TokenError::InvalidSignature => {
            (StatusCode::UNAUTHORIZED, "Invalid token".to_owned())
        }
    }
}

fn oauth(err: &OAuthError) -> (StatusCode, String) {
    match err {
        OAuthError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        OAuthError::StateMismatch | OAuthError::MissingEmail => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        OAuthError::Exchange(_) | OAuthError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            "Identity provider error".to_owned(),
        ),
        OAuthError::Auth(inner) => auth(inner),
    }
}

fn order(err: &OrderError) -> (StatusCode, String) {
    let status = match err {
        OrderError::NoItems | OrderError::InvalidQuantity | OrderError::InvalidGuest(_) => {
            StatusCode::BAD_REQUEST
        }
        OrderError::AddressNotFound | OrderError::ProductNotFound | OrderError::NotFound => {
            StatusCode::NOT_FOUND
        }
        OrderError::EmptyCart
        | OrderError::ProductUnavailable { .. }
        | OrderError::InsufficientStock { .. }
        | OrderError::NotCancellable { .. }
        | OrderError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::OrderNumberExhausted => {
            return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_owned());
        }
        OrderError::Repository(inner) => return repository(inner),
    };
    (status, err.to_string())
}

fn payment(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::OrderNotFound | PaymentError::PaymentNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        PaymentError::OrderNotPending { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        PaymentError::InvalidSignature | PaymentError::SimulationDisabled => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        PaymentError::Gateway(inner) => gateway(inner),
        PaymentError::Order(inner) => order(inner),
        PaymentError::Repository(inner) => repository(inner),
    }
}

fn gateway(err: &PaymentGatewayError) -> (StatusCode, String) {
    if err.is_retryable() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Payment gateway unavailable, please retry".to_owned(),
        )
    } else {
        (StatusCode::BAD_GATEWAY, "Payment gateway error".to_owned())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use nexora_core::OrderStatus;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("test".to_string())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("test".to_string())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("test".to_string())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("test".to_string())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_business_rules_are_unprocessable() {
        assert_eq!(get_status(OrderError::EmptyCart), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            get_status(OrderError::InsufficientStock { product: "Mug".to_owned() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(OrderError::NotCancellable { status: OrderStatus::Paid }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_ownership_mismatch_is_not_found() {
        assert_eq!(get_status(OrderError::AddressNotFound), StatusCode::NOT_FOUND);
        assert_eq!(get_status(PaymentError::OrderNotFound), StatusCode::NOT_FOUND);
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflicts() {
        assert_eq!(get_status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            get_status(RepositoryError::Conflict("duplicate review".to_owned())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_webhook_signature_is_forbidden() {
        assert_eq!(get_status(PaymentError::InvalidSignature), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_gateway_errors() {
        assert_eq!(
            get_status(PaymentError::Gateway(PaymentGatewayError::Timeout)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(PaymentError::Gateway(PaymentGatewayError::MissingToken)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internals_hidden() {
        let (_, message) =
            AppError::from(RepositoryError::DataCorruption("bad row".to_owned())).status_and_message();
        assert_eq!(message, INTERNAL);
    }

    #[test]
    fn test_token_errors_unauthorized() {
        assert_eq!(get_status(TokenError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(TokenError::InvalidSignature), StatusCode::UNAUTHORIZED);
    }
}
