//! Database migration command.
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded at
//! compile time.

use sqlx::PgPool;

use super::CliError;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CliError::Migration` if a migration fails.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}
