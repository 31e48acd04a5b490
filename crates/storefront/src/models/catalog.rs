//! Catalog models: categories, products, variants, images and reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use nexora_core::{CategoryId, ImageId, Price, ProductId, ReviewId, UserId, VariantId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

/// Product as shown in listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub base_price: Price,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: ImageId,
    pub url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// A priced, separately stocked configuration of a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub value: String,
    pub price_modifier: Decimal,
    pub stock: i32,
    pub sku: Option<String>,
}

impl ProductVariant {
    /// Human-readable description stored on order lines, e.g. `Size: XL`.
    #[must_use]
    pub fn describe(name: &str, value: &str) -> String {
        format!("{name}: {value}")
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the product page needs, assembled from purpose-built queries.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductSummary,
    pub category: Option<Category>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<ProductVariant>,
    pub reviews: Vec<Review>,
}

impl ProductDetail {
    /// Mean review rating, 0 when there are no reviews.
    #[must_use]
    pub fn avg_rating(&self) -> f64 {
        if self.reviews.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.reviews.iter().map(|r| f64::from(r.rating)).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.reviews.len() as f64;
        sum / count
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub price_modifier: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub sku: Option<String>,
}

impl NewVariant {
    /// # Errors
    ///
    /// Returns a message naming the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.value.trim().is_empty() {
            return Err("variant name and value are required".to_owned());
        }
        if self.stock < 0 {
            return Err("variant stock cannot be negative".to_owned());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantUpdate {
    pub name: Option<String>,
    pub value: Option<String>,
    pub price_modifier: Option<Decimal>,
    pub stock: Option<i32>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    /// Image URLs in display order; the first becomes the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

const fn default_true() -> bool {
    true
}

impl NewProduct {
    /// # Errors
    ///
    /// Returns a message naming the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        if self.base_price.is_sign_negative() {
            return Err("base_price cannot be negative".to_owned());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_owned());
        }
        self.variants.iter().try_for_each(NewVariant::validate)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    /// Replaces the whole image list when present.
    pub images: Option<Vec<String>>,
}

impl ProductUpdate {
    /// # Errors
    ///
    /// Returns a message naming the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name cannot be empty".to_owned());
        }
        if self.base_price.is_some_and(|p| p.is_sign_negative()) {
            return Err("base_price cannot be negative".to_owned());
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err("stock cannot be negative".to_owned());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

impl NewReview {
    /// # Errors
    ///
    /// Returns a message when the rating is outside 1 to 5.
    pub fn validate(&self) -> Result<(), String> {
        if (1..=5).contains(&self.rating) {
            Ok(())
        } else {
            Err("rating must be between 1 and 5".to_owned())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_description() {
        assert_eq!(ProductVariant::describe("Size", "XL"), "Size: XL");
    }

    #[test]
    fn test_review_rating_bounds() {
        let review = |rating| NewReview {
            product_id: ProductId::generate(),
            rating,
            comment: String::new(),
        };
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert!(review(0).validate().is_err());
        assert!(review(6).validate().is_err());
    }

    #[test]
    fn test_new_product_defaults() {
        let product: NewProduct = serde_json::from_value(serde_json::json!({
            "name": "Batik Shirt",
            "base_price": "250000"
        }))
        .unwrap();
        assert!(product.is_active);
        assert!(!product.is_featured);
        assert!(product.images.is_empty());
        assert!(product.validate().is_ok());
    }

    #[test]
    fn test_new_product_rejects_negative_stock() {
        let product: NewProduct = serde_json::from_value(serde_json::json!({
            "name": "Batik Shirt",
            "base_price": 250_000,
            "stock": -1
        }))
        .unwrap();
        assert_eq!(product.validate().unwrap_err(), "stock cannot be negative");
    }
}
