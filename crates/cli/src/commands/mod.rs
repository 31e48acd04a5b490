//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use sqlx::PgPool;
use thiserror::Error;

use nexora_storefront::config::StorefrontConfig;
use nexora_storefront::db::{self, RepositoryError};
use nexora_storefront::services::auth::AuthError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No user with email: {0}")]
    UserNotFound(String),

    /// Account already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),
}

/// Connect to the storefront database.
///
/// # Errors
///
/// Returns `CliError::Database` if the connection fails.
pub async fn connect() -> Result<PgPool, CliError> {
    let database_url = StorefrontConfig::database_url_from_env();
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
