//! Seed the database with a demo catalog.
//!
//! Idempotent: categories and products whose slug already exists are left
//! alone, so the command can be re-run after adding entries here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

use nexora_core::CategoryId;
use nexora_storefront::db::{CategoryRepository, ProductRepository, RepositoryError};
use nexora_storefront::models::{CategoryInput, NewProduct, NewVariant};
use nexora_storefront::services::catalog::slugify;

use super::CliError;

struct DemoCategory {
    name: &'static str,
    icon: &'static str,
}

struct DemoVariant {
    name: &'static str,
    value: &'static str,
    price_modifier: i64,
    stock: i32,
}

struct DemoProduct {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    price: i64,
    stock: i32,
    featured: bool,
    images: &'static [&'static str],
    variants: &'static [DemoVariant],
}

const CATEGORIES: &[DemoCategory] = &[
    DemoCategory { name: "Fashion", icon: "shirt" },
    DemoCategory { name: "Electronics", icon: "cpu" },
    DemoCategory { name: "Home & Living", icon: "home" },
    DemoCategory { name: "Food & Beverage", icon: "coffee" },
];

const SIZES: &[DemoVariant] = &[
    DemoVariant { name: "Size", value: "M", price_modifier: 0, stock: 20 },
    DemoVariant { name: "Size", value: "L", price_modifier: 0, stock: 15 },
    DemoVariant { name: "Size", value: "XL", price_modifier: 10_000, stock: 10 },
];

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        name: "Batik Tulis Shirt",
        category: "fashion",
        description: "Hand-drawn batik shirt in cotton primisima.",
        price: 350_000,
        stock: 45,
        featured: true,
        images: &[
            "https://images.unsplash.com/photo-1602810318383-e386cc2a3ccf",
            "https://images.unsplash.com/photo-1596755094514-f87e34085b2c",
        ],
        variants: SIZES,
    },
    DemoProduct {
        name: "Linen Kebaya Top",
        category: "fashion",
        description: "Lightweight linen kebaya for everyday wear.",
        price: 275_000,
        stock: 45,
        featured: false,
        images: &["https://images.unsplash.com/photo-1583391733956-6c78276477e2"],
        variants: SIZES,
    },
    DemoProduct {
        name: "Wireless Earbuds Pro",
        category: "electronics",
        description: "Noise-cancelling earbuds with 30 hours of battery.",
        price: 899_000,
        stock: 30,
        featured: true,
        images: &["https://images.unsplash.com/photo-1590658268037-6bf12165a8df"],
        variants: &[
            DemoVariant { name: "Color", value: "Black", price_modifier: 0, stock: 15 },
            DemoVariant { name: "Color", value: "White", price_modifier: 0, stock: 15 },
        ],
    },
    DemoProduct {
        name: "Mechanical Keyboard 75%",
        category: "electronics",
        description: "Hot-swappable keyboard with brown switches.",
        price: 1_250_000,
        stock: 12,
        featured: false,
        images: &["https://images.unsplash.com/photo-1587829741301-dc798b83add3"],
        variants: &[],
    },
    DemoProduct {
        name: "Teak Serving Board",
        category: "home-living",
        description: "Solid Javanese teak, food-safe oil finish.",
        price: 185_000,
        stock: 25,
        featured: false,
        images: &["https://images.unsplash.com/photo-1544441893-675973e31985"],
        variants: &[],
    },
    DemoProduct {
        name: "Gayo Arabica Coffee 250g",
        category: "food-beverage",
        description: "Single-origin beans from Aceh, medium roast.",
        price: 95_000,
        stock: 100,
        featured: true,
        images: &["https://images.unsplash.com/photo-1559056199-641a0ac8b55e"],
        variants: &[
            DemoVariant { name: "Grind", value: "Whole bean", price_modifier: 0, stock: 60 },
            DemoVariant { name: "Grind", value: "Espresso", price_modifier: 5_000, stock: 40 },
        ],
    },
];

/// Seed the demo catalog.
///
/// # Arguments
///
/// * `reset` - Delete every product and category first. Carts, wishlists
///   and reviews of those products go with them; order lines keep their
///   snapshots.
///
/// # Errors
///
/// Returns an error if a database operation fails.
pub async fn run(pool: &PgPool, reset: bool) -> Result<(), CliError> {
    if reset {
        reset_catalog(pool).await?;
    }

    let category_ids = seed_categories(pool).await?;
    let created = seed_products(pool, &category_ids).await?;

    info!(
        categories = category_ids.len(),
        products_created = created,
        "Seeding complete!"
    );
    Ok(())
}

async fn reset_catalog(pool: &PgPool) -> Result<(), CliError> {
    let mut tx = pool.begin().await?;
    let products = sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
    let categories = sqlx::query("DELETE FROM categories").execute(&mut *tx).await?;
    tx.commit().await?;

    info!(
        products = products.rows_affected(),
        categories = categories.rows_affected(),
        "Catalog cleared"
    );
    Ok(())
}

/// Create missing categories; returns every category id by slug.
async fn seed_categories(pool: &PgPool) -> Result<HashMap<String, CategoryId>, CliError> {
    let repo = CategoryRepository::new(pool);
    let mut by_slug: HashMap<String, CategoryId> = repo
        .list()
        .await?
        .into_iter()
        .map(|c| (c.slug, c.id))
        .collect();

    for demo in CATEGORIES {
        let slug = slugify(demo.name);
        if by_slug.contains_key(&slug) {
            continue;
        }
        let category = repo
            .create(
                &CategoryInput {
                    name: demo.name.to_owned(),
                    icon: demo.icon.to_owned(),
                },
                &slug,
            )
            .await?;
        info!(slug = %category.slug, "Created category");
        by_slug.insert(category.slug, category.id);
    }

    Ok(by_slug)
}

async fn seed_products(
    pool: &PgPool,
    category_ids: &HashMap<String, CategoryId>,
) -> Result<usize, CliError> {
    let repo = ProductRepository::new(pool);
    let mut created = 0;

    for demo in PRODUCTS {
        let slug = slugify(demo.name);
        if repo.get_detail(&slug, true).await?.is_some() {
            continue;
        }

        let product = NewProduct {
            name: demo.name.to_owned(),
            description: demo.description.to_owned(),
            base_price: Decimal::from(demo.price),
            stock: demo.stock,
            category_id: category_ids.get(demo.category).copied(),
            is_active: true,
            is_featured: demo.featured,
            images: demo.images.iter().map(|url| (*url).to_owned()).collect(),
            variants: demo
                .variants
                .iter()
                .map(|v| NewVariant {
                    name: v.name.to_owned(),
                    value: v.value.to_owned(),
                    price_modifier: Decimal::from(v.price_modifier),
                    stock: v.stock,
                    sku: Some(format!("{}-{}", slug, slugify(v.value)).to_uppercase()),
                })
                .collect(),
        };

        // A soft-deleted product still owns its slug.
        match repo.create(&product, &slug).await {
            Ok(id) => {
                info!(product_id = %id, %slug, "Created product");
                created += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::warn!(%slug, "Slug held by a deleted product, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_demo_products_reference_demo_categories() {
        let slugs: HashSet<String> = CATEGORIES.iter().map(|c| slugify(c.name)).collect();
        for product in PRODUCTS {
            assert!(
                slugs.contains(product.category),
                "{} references unknown category {}",
                product.name,
                product.category
            );
        }
    }

    #[test]
    fn test_demo_products_are_valid() {
        for demo in PRODUCTS {
            assert!(!demo.images.is_empty(), "{} has no image", demo.name);
            assert!(demo.price > 0);
            let slug = slugify(demo.name);
            assert!(!slug.is_empty());
        }
    }
}
