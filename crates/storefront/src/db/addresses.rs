//! Address repository. Every query is scoped to the owning user, so a
//! foreign address id behaves exactly like a missing one.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use nexora_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, label, name, phone, street, city, state, \
     postal_code, country, is_default, created_at, updated_at";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Fetch one address if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_owned(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        find_owned(&mut *self.pool.acquire().await?, id, user_id).await
    }

    /// Create an address. A new default clears the previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as(&format!(
            r"
            INSERT INTO addresses
                (user_id, label, name, phone, street, city, state, postal_code, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.label.trim())
        .bind(input.name.trim())
        .bind(input.phone.trim())
        .bind(input.street.trim())
        .bind(input.city.trim())
        .bind(input.state.trim())
        .bind(input.postal_code.trim())
        .bind(input.country())
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is missing or foreign.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: AddressId,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address: Option<Address> = sqlx::query_as(&format!(
            r"
            UPDATE addresses
            SET label = $3, name = $4, phone = $5, street = $6, city = $7,
                state = $8, postal_code = $9, country = $10, is_default = $11,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.label.trim())
        .bind(input.name.trim())
        .bind(input.phone.trim())
        .bind(input.street.trim())
        .bind(input.city.trim())
        .bind(input.state.trim())
        .bind(input.postal_code.trim())
        .bind(input.country())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?;

        let address = address.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(address)
    }

    /// Delete an address.
    ///
    /// Orders keep working: their reference is nulled by the foreign key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is missing or foreign.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: AddressId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Owner-scoped lookup usable inside a transaction.
pub(crate) async fn find_owned(
    conn: &mut PgConnection,
    id: AddressId,
    user_id: UserId,
) -> Result<Option<Address>, RepositoryError> {
    let address = sqlx::query_as(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(address)
}

/// Unscoped lookup for order detail views.
pub(crate) async fn find_by_id(
    conn: &mut PgConnection,
    id: AddressId,
) -> Result<Option<Address>, RepositoryError> {
    let address = sqlx::query_as(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(address)
}

async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
