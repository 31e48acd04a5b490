//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Promote an account that signed up through the storefront
//! nexora-cli admin promote -e owner@example.com
//!
//! # Create an admin account directly
//! nexora-cli admin create -e owner@example.com -n "Store Owner" -p 's3cret-pass'
//! ```

use sqlx::PgPool;

use nexora_core::{Email, Role};
use nexora_storefront::db::UserRepository;
use nexora_storefront::db::users::NewUser;
use nexora_storefront::services::auth::{AuthError, hash_password, validate_password};

use super::CliError;

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has this email.
pub async fn promote(pool: &PgPool, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;
    let users = UserRepository::new(pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_string()))?;

    if user.role == Role::Admin {
        tracing::info!("{} is already an admin", email);
        return Ok(());
    }

    users.set_role(user.id, Role::Admin).await?;
    tracing::info!("Promoted {} (ID: {}) to admin", email, user.id);
    Ok(())
}

/// Create a new admin account with a password.
///
/// # Errors
///
/// Returns `CliError::UserExists` if the email is taken, or
/// `CliError::Auth` if the password is too weak.
pub async fn create(pool: &PgPool, email: &str, name: &str, password: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::MissingName.into());
    }

    let users = UserRepository::new(pool);
    if users.get_by_email(&email).await?.is_some() {
        return Err(CliError::UserExists(email.to_string()));
    }

    validate_password(password)?;
    let password_hash = hash_password(password)?;
    let user = users
        .create(&NewUser {
            email: &email,
            name,
            password_hash: Some(&password_hash),
            google_id: None,
            avatar_url: None,
            role: Role::Admin,
        })
        .await?;

    tracing::info!("Admin created! ID: {}, Email: {}", user.id, email);
    Ok(())
}
