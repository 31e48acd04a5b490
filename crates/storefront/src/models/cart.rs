//! Cart and wishlist views.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nexora_core::{CartItemId, Price, ProductId, VariantId, WishlistId};

/// A cart line priced at current catalog prices.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image: Option<String>,
    pub variant_id: Option<VariantId>,
    pub variant_info: Option<String>,
    pub unit_price: Price,
    pub quantity: i32,
    pub line_total: Price,
    /// Stock currently available for this product or variant.
    pub available: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: Price,
    /// Number of distinct lines.
    pub count: usize,
}

impl CartView {
    #[must_use]
    pub fn new(items: Vec<CartLine>) -> Self {
        let subtotal = items.iter().map(|line| line.line_total).sum();
        let count = items.len();
        Self {
            items,
            subtotal,
            count,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WishlistEntry {
    pub id: WishlistId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub base_price: Price,
    pub primary_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
