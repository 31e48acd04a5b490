//! Cart and wishlist repositories.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use nexora_core::{CartItemId, Price, ProductId, UserId, VariantId};

use super::RepositoryError;
use crate::models::{CartLine, ProductVariant, WishlistEntry};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    product_id: ProductId,
    product_name: String,
    product_slug: String,
    image: Option<String>,
    variant_id: Option<VariantId>,
    variant_name: Option<String>,
    variant_value: Option<String>,
    base_price: Price,
    price_modifier: Option<Decimal>,
    quantity: i32,
    available: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(r: CartLineRow) -> Self {
        let unit_price = r
            .base_price
            .with_modifier(r.price_modifier.unwrap_or_default());
        let variant_info = match (r.variant_name, r.variant_value) {
            (Some(name), Some(value)) => Some(ProductVariant::describe(&name, &value)),
            _ => None,
        };

        Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            product_slug: r.product_slug,
            image: r.image,
            variant_id: r.variant_id,
            variant_info,
            unit_price,
            quantity: r.quantity,
            line_total: unit_price * r.quantity,
            available: r.available,
        }
    }
}

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart lines priced at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id, ci.product_id, p.name AS product_name, p.slug AS product_slug,
                   (SELECT i.url FROM product_images i
                     WHERE i.product_id = p.id
                     ORDER BY i.is_primary DESC, i.sort_order
                     LIMIT 1) AS image,
                   ci.variant_id, v.name AS variant_name, v.value AS variant_value,
                   p.base_price, v.price_modifier, ci.quantity,
                   LEAST(p.stock, COALESCE(v.stock, p.stock)) AS available
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            LEFT JOIN product_variants v ON v.id = ci.variant_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Add to the cart, merging with an existing line for the same
    /// product and variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not purchasable
    /// or the variant does not belong to it.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
    ) -> Result<CartItemId, RepositoryError> {
        let purchasable: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM products
                WHERE id = $1 AND is_active AND deleted_at IS NULL
            )
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        if !purchasable {
            return Err(RepositoryError::NotFound);
        }

        if let Some(variant_id) = variant_id {
            let belongs: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM product_variants WHERE id = $1 AND product_id = $2)",
            )
            .bind(variant_id)
            .bind(product_id)
            .fetch_one(self.pool)
            .await?;
            if !belongs {
                return Err(RepositoryError::NotFound);
            }
        }

        let id = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (user_id, product_id, variant_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT cart_items_one_line
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is missing or foreign.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is missing or foreign.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let rows = sqlx::query_as(
            r"
            SELECT w.id, w.product_id, p.name AS product_name, p.slug AS product_slug,
                   p.base_price,
                   (SELECT i.url FROM product_images i
                     WHERE i.product_id = p.id
                     ORDER BY i.is_primary DESC, i.sort_order
                     LIMIT 1) AS primary_image,
                   (p.is_active AND p.deleted_at IS NULL) AS is_active,
                   w.created_at
            FROM wishlists w
            JOIN products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if it is already wishlisted.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("INSERT INTO wishlists (user_id, product_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::unique_or_db(e, "product is already in your wishlist"))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was not wishlisted.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
