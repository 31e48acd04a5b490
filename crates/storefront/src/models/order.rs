//! Orders and their line items.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nexora_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Purchaser, VariantId,
};

use super::{Address, Payment};

/// An order header. Totals are fixed at creation.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub purchaser: Purchaser,
    pub address_id: Option<AddressId>,
    pub status: OrderStatus,
    pub subtotal: Price,
    pub shipping_fee: Price,
    pub total: Price,
    pub notes: String,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time snapshot of one purchased line.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_info: Option<String>,
    pub unit_price: Price,
    pub quantity: i32,
    pub line_total: Price,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub address: Option<Address>,
    pub payment: Option<Payment>,
}

/// Row of an order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderListEntry {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    /// Account name or guest name.
    pub purchaser_name: String,
}
