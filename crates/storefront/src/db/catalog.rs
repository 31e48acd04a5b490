//! Catalog repositories: categories, products, variants, images and reviews.
//!
//! Products are soft-deleted so order history and foreign keys stay valid;
//! every public query filters on `deleted_at IS NULL`.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use nexora_core::{CategoryId, ProductId, UserId, VariantId};

use super::{Page, RepositoryError};
use crate::models::{
    Category, CategoryInput, NewProduct, NewReview, NewVariant, ProductDetail,
    ProductSummary, ProductUpdate, ProductVariant, Review, VariantUpdate,
};

// =============================================================================
// Categories
// =============================================================================

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows =
            sqlx::query_as("SELECT id, name, slug, icon, created_at FROM categories ORDER BY name")
                .fetch_all(self.pool)
                .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &CategoryInput, slug: &str) -> Result<Category, RepositoryError> {
        sqlx::query_as(
            r"
            INSERT INTO categories (name, slug, icon)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, icon, created_at
            ",
        )
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.icon.trim())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a category with this name already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
        slug: &str,
    ) -> Result<Category, RepositoryError> {
        let row: Option<Category> = sqlx::query_as(
            r"
            UPDATE categories
            SET name = $2, slug = $3, icon = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, icon, created_at
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.icon.trim())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a category with this name already exists"))?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Delete a category; its products become uncategorised.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Products
// =============================================================================

/// Category filter given either as id or slug.
#[derive(Debug, Clone)]
pub enum CategoryRef {
    Id(CategoryId),
    Slug(String),
}

impl CategoryRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.parse::<CategoryId>()
            .map_or_else(|_| Self::Slug(raw.to_owned()), Self::Id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Price,
    Name,
}

impl ProductSort {
    /// Whitelisted sort keys; anything else falls back to newest first.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "price" | "base_price" => Self::Price,
            "name" => Self::Name,
            _ => Self::CreatedAt,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Price => "p.base_price",
            Self::Name => "p.name",
        }
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<CategoryRef>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub descending: bool,
}

const SUMMARY_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.description, p.base_price, p.stock,
           p.is_active, p.is_featured, p.category_id, c.name AS category_name,
           (SELECT i.url FROM product_images i
             WHERE i.product_id = p.id
             ORDER BY i.is_primary DESC, i.sort_order
             LIMIT 1) AS primary_image,
           p.created_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
";

/// Escape `LIKE` wildcards in user input.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE p.deleted_at IS NULL");

    if !filter.include_inactive {
        qb.push(" AND p.is_active");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    match &filter.category {
        Some(CategoryRef::Id(id)) => {
            qb.push(" AND p.category_id = ").push_bind(*id);
        }
        Some(CategoryRef::Slug(slug)) => {
            qb.push(" AND c.slug = ").push_bind(slug.clone());
        }
        None => {}
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND p.is_featured = ").push_bind(featured);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.base_price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.base_price <= ").push_bind(max);
    }
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, paginated product listing with the matching total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY ")
            .push(filter.sort.column())
            .push(if filter.descending { " DESC" } else { " ASC" })
            .push(", p.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let products = qb
            .build_query_as::<ProductSummary>()
            .fetch_all(self.pool)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        Ok((products, total))
    }

    /// Load a product page by id or slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_detail(
        &self,
        id_or_slug: &str,
        include_inactive: bool,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        qb.push(" WHERE p.deleted_at IS NULL");
        if !include_inactive {
            qb.push(" AND p.is_active");
        }
        match id_or_slug.parse::<ProductId>() {
            Ok(id) => qb.push(" AND p.id = ").push_bind(id),
            Err(_) => qb.push(" AND p.slug = ").push_bind(id_or_slug.to_owned()),
        };

        let Some(product) = qb
            .build_query_as::<ProductSummary>()
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let category = match product.category_id {
            Some(category_id) => {
                sqlx::query_as(
                    "SELECT id, name, slug, icon, created_at FROM categories WHERE id = $1",
                )
                .bind(category_id)
                .fetch_optional(self.pool)
                .await?
            }
            None => None,
        };

        let images = sqlx::query_as(
            r"
            SELECT id, url, alt_text, is_primary, sort_order
            FROM product_images
            WHERE product_id = $1
            ORDER BY sort_order
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        let variants = sqlx::query_as(
            r"
            SELECT id, product_id, name, value, price_modifier, stock, sku
            FROM product_variants
            WHERE product_id = $1
            ORDER BY name, value
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        let reviews = sqlx::query_as(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name,
                   r.rating, r.comment, r.created_at
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(ProductDetail {
            product,
            category,
            images,
            variants,
            reviews,
        }))
    }

    /// Create a product with its images and variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, new))]
    pub async fn create(&self, new: &NewProduct, slug: &str) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products
                (category_id, name, slug, description, base_price, stock, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(new.category_id)
        .bind(new.name.trim())
        .bind(slug)
        .bind(&new.description)
        .bind(new.base_price)
        .bind(new.stock)
        .bind(new.is_active)
        .bind(new.is_featured)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a product with this name already exists"))?;

        replace_images(&mut tx, id, &new.images, &new.name).await?;
        for variant in &new.variants {
            insert_variant(&mut tx, id, variant).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Apply a partial update. `slug` is set when the name changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
        slug: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let name: Option<String> = sqlx::query_scalar(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                base_price = COALESCE($5, base_price),
                stock = COALESCE($6, stock),
                category_id = COALESCE($7, category_id),
                is_active = COALESCE($8, is_active),
                is_featured = COALESCE($9, is_featured),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING name
            ",
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(slug)
        .bind(update.description.as_deref())
        .bind(update.base_price)
        .bind(update.stock)
        .bind(update.category_id)
        .bind(update.is_active)
        .bind(update.is_featured)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a product with this name already exists"))?;

        let name = name.ok_or(RepositoryError::NotFound)?;

        if let Some(images) = &update.images {
            replace_images(&mut tx, id, images, &name).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Soft-delete a product and drop it from every cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE products
            SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self, new))]
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        new: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let variant = insert_variant(&mut tx, product_id, new).await?;
        tx.commit().await?;
        Ok(variant)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    #[instrument(skip(self, update))]
    pub async fn update_variant(
        &self,
        id: VariantId,
        update: &VariantUpdate,
    ) -> Result<ProductVariant, RepositoryError> {
        let row: Option<ProductVariant> = sqlx::query_as(
            r"
            UPDATE product_variants
            SET name = COALESCE($2, name),
                value = COALESCE($3, value),
                price_modifier = COALESCE($4, price_modifier),
                stock = COALESCE($5, stock),
                sku = COALESCE($6, sku)
            WHERE id = $1
            RETURNING id, product_id, name, value, price_modifier, stock, sku
            ",
        )
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.value.as_deref())
        .bind(update.price_modifier)
        .bind(update.stock)
        .bind(update.sku.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Delete a variant. Cart lines referencing it go with it; order lines
    /// keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    #[instrument(skip(self))]
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn replace_images(
    conn: &mut PgConnection,
    product_id: ProductId,
    urls: &[String],
    alt_text: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM product_images WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let urls: Vec<String> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_owned)
        .collect();
    if urls.is_empty() {
        return Ok(());
    }

    // First image is the primary one, order follows the input
    sqlx::query(
        r"
        INSERT INTO product_images (product_id, url, alt_text, is_primary, sort_order)
        SELECT $1, u.url, $3, u.ord = 1, (u.ord - 1)::INT
        FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS u(url, ord)
        ",
    )
    .bind(product_id)
    .bind(&urls)
    .bind(alt_text.trim())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_variant(
    conn: &mut PgConnection,
    product_id: ProductId,
    new: &NewVariant,
) -> Result<ProductVariant, RepositoryError> {
    let variant = sqlx::query_as(
        r"
        INSERT INTO product_variants (product_id, name, value, price_modifier, stock, sku)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, product_id, name, value, price_modifier, stock, sku
        ",
    )
    .bind(product_id)
    .bind(new.name.trim())
    .bind(new.value.trim())
    .bind(new.price_modifier)
    .bind(new.stock)
    .bind(new.sku.as_deref())
    .fetch_one(conn)
    .await?;
    Ok(variant)
}

// =============================================================================
// Reviews
// =============================================================================

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create the caller's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the user already reviewed it.
    #[instrument(skip(self, new))]
    pub async fn create(&self, user_id: UserId, new: &NewReview) -> Result<Review, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(new.product_id)
        .fetch_one(self.pool)
        .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query_as(
            r"
            WITH inserted AS (
                INSERT INTO reviews (user_id, product_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING id, product_id, user_id, rating, comment, created_at
            )
            SELECT i.id, i.product_id, i.user_id, u.name AS user_name,
                   i.rating, i.comment, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            ",
        )
        .bind(user_id)
        .bind(new.product_id)
        .bind(new.rating)
        .bind(new.comment.trim())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "you have already reviewed this product"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("batik"), "%batik%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(ProductSort::parse("price"), ProductSort::Price);
        assert_eq!(ProductSort::parse("name"), ProductSort::Name);
        assert_eq!(ProductSort::parse("stock; DROP TABLE"), ProductSort::CreatedAt);
    }

    #[test]
    fn test_category_ref_parse() {
        let id = CategoryId::generate();
        assert!(matches!(CategoryRef::parse(&id.to_string()), CategoryRef::Id(parsed) if parsed == id));
        assert!(matches!(CategoryRef::parse("fashion"), CategoryRef::Slug(ref s) if s == "fashion"));
    }

    #[test]
    fn test_filter_sql_shape() {
        let filter = ProductFilter {
            search: Some("kopi".to_owned()),
            featured: Some(true),
            min_price: Some(Decimal::from(1000)),
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("p.deleted_at IS NULL AND p.is_active"));
        assert!(sql.contains("p.name ILIKE $1 OR p.description ILIKE $2"));
        assert!(sql.contains("p.is_featured = $3"));
        assert!(sql.contains("p.base_price >= $4"));
    }
}
