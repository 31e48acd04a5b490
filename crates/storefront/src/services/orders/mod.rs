//! Order engine.
//!
//! Turns a cart, or a guest's explicit item list, into an order inside a
//! single transaction: snapshot lines, conditional stock decrement, cart
//! clear. Cancellation and admin status changes restore stock in the same
//! way. Any failure rolls the whole unit back.

pub mod number;

use serde::Deserialize;
use sqlx::{Connection, PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use nexora_core::{
    AddressId, Email, GuestContact, OrderId, OrderStatus, OrderTotals, ProductId, Purchaser,
    ShippingPolicy, UserId, VariantId,
};

use crate::db::orders::{self as order_rows, CatalogLine, NewOrder, ORDER_NUMBER_CONSTRAINT, OrderRowHandle};
use crate::db::{OrderRepository, Page, RepositoryError, UserRepository, addresses, is_unique_violation_on};
use crate::models::{Identity, Order, OrderDetail, OrderListEntry};

/// How many order numbers to try before giving up.
pub const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("order must contain at least one item")]
    NoItems,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("shipping address not found")]
    AddressNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("product is no longer available: {product}")]
    ProductUnavailable { product: String },

    #[error("insufficient stock for {product}")]
    InsufficientStock { product: String },

    #[error("only pending orders can be cancelled (order is {status})")]
    NotCancellable { status: OrderStatus },

    #[error("cannot change a {from} order to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("invalid guest details: {0}")]
    InvalidGuest(&'static str),

    #[error("order not found")]
    NotFound,

    /// Every generated order number collided.
    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// One requested line of a guest order.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

/// A guest checkout.
#[derive(Debug, Clone)]
pub struct GuestOrderRequest {
    pub contact: GuestContact,
    pub items: Vec<GuestLine>,
    pub notes: String,
}

impl GuestOrderRequest {
    /// Check contact details and line quantities.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), OrderError> {
        let c = &self.contact;
        if c.name.trim().is_empty() {
            return Err(OrderError::InvalidGuest("name is required"));
        }
        if c.phone.trim().is_empty() {
            return Err(OrderError::InvalidGuest("phone is required"));
        }
        if c.address.trim().is_empty() {
            return Err(OrderError::InvalidGuest("address is required"));
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if self.items.iter().any(|l| l.quantity < 1) {
            return Err(OrderError::InvalidQuantity);
        }
        Ok(())
    }
}

pub struct OrderService<'a> {
    pool: &'a PgPool,
    shipping: &'a ShippingPolicy,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingPolicy) -> Self {
        Self { pool, shipping }
    }

    /// Check out the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::AddressNotFound` if the address is not the
    /// caller's, `OrderError::EmptyCart` for an empty cart, and the
    /// stock/availability errors of the lines. Nothing is written on error.
    #[instrument(skip(self, identity, notes), fields(user_id = %identity.user_id))]
    pub async fn place_order(
        &self,
        identity: &Identity,
        address_id: AddressId,
        notes: &str,
    ) -> Result<OrderDetail, OrderError> {
        let user = UserRepository::new(self.pool)
            .get_by_id(identity.user_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let mut tx = self.pool.begin().await?;

        addresses::find_owned(&mut tx, address_id, user.id)
            .await?
            .ok_or(OrderError::AddressNotFound)?;

        let lines = order_rows::lock_cart_lines(&mut tx, user.id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let purchaser = Purchaser::Registered { user_id: user.id };
        let order = write_order(
            &mut tx,
            &purchaser,
            Some(address_id),
            &user.name,
            &lines,
            notes,
            self.shipping,
        )
        .await?;
        order_rows::clear_cart_lines(&mut tx, user.id, &lines).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order placed"
        );
        Ok(OrderRepository::new(self.pool).detail(order).await?)
    }

    /// Place an order without an account.
    ///
    /// # Errors
    ///
    /// Returns validation errors for the request, `OrderError::ProductNotFound`
    /// for unknown products or mismatched variants, and the stock errors.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn place_guest_order(
        &self,
        request: &GuestOrderRequest,
    ) -> Result<OrderDetail, OrderError> {
        request.validate()?;

        let mut tx = self.pool.begin().await?;

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let line = order_rows::resolve_line(&mut tx, item.product_id, item.variant_id, item.quantity)
                .await?
                .ok_or(OrderError::ProductNotFound)?;
            lines.push(line);
        }

        let purchaser = Purchaser::Guest(request.contact.clone());
        let order = write_order(
            &mut tx,
            &purchaser,
            None,
            &request.contact.name,
            &lines,
            request.notes.trim(),
            self.shipping,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "guest order placed"
        );
        Ok(OrderRepository::new(self.pool).detail(order).await?)
    }

    /// Cancel a pending order, returning its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` unless the caller owns the order or is
    /// an admin, and `OrderError::NotCancellable` unless it is pending.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn cancel(&self, id: OrderId, identity: &Identity) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = order_rows::lock_order(&mut tx, id)
            .await?
            .filter(|o| identity.is_admin() || o.purchaser.is_owned_by(identity.user_id))
            .ok_or(OrderError::NotFound)?;

        if !order.status.is_cancellable() {
            return Err(OrderError::NotCancellable {
                status: order.status,
            });
        }

        order_rows::restore_stock(&mut tx, id).await?;
        let order = order_rows::write_status(&mut tx, id, OrderStatus::Cancelled, None).await?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }

    /// Admin status change. Moving to `cancelled` restores stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown orders and
    /// `OrderError::InvalidTransition` when leaving `cancelled`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = order_rows::lock_order(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.admin_can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }
        if order.status.restores_stock_on(status) {
            order_rows::restore_stock(&mut tx, id).await?;
        }

        let tracking_number = tracking_number.map(str::trim).filter(|t| !t.is_empty());
        let updated = order_rows::write_status(&mut tx, id, status, tracking_number).await?;

        tx.commit().await?;

        tracing::info!(order_id = %id, from = %order.status, to = %status, "order status updated");
        Ok(updated)
    }

    /// Detail of an order the caller may see.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for missing or foreign orders.
    pub async fn detail_for(
        &self,
        id: OrderId,
        identity: &Identity,
    ) -> Result<OrderDetail, OrderError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .get_visible(id, identity.user_id, identity.is_admin())
            .await?
            .ok_or(OrderError::NotFound)?;
        Ok(orders.detail(order).await?)
    }

    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list_for(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<OrderListEntry>, i64), OrderError> {
        Ok(OrderRepository::new(self.pool)
            .list_for_user(user_id, page)
            .await?)
    }

    /// Look up an order by number and purchaser email.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if nothing matches both.
    pub async fn track(&self, order_number: &str, email: &Email) -> Result<OrderDetail, OrderError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .find_for_tracking(order_number, email)
            .await?
            .ok_or(OrderError::NotFound)?;
        Ok(orders.detail(order).await?)
    }
}

/// Reserve stock for every line, then insert header and items.
async fn write_order(
    conn: &mut PgConnection,
    purchaser: &Purchaser,
    address_id: Option<AddressId>,
    display_name: &str,
    lines: &[CatalogLine],
    notes: &str,
    shipping: &ShippingPolicy,
) -> Result<Order, OrderError> {
    if let Some(line) = lines.iter().find(|l| !l.purchasable) {
        return Err(OrderError::ProductUnavailable {
            product: line.product_name.clone(),
        });
    }

    // Quantities above stock must fail here, before totals reach NUMERIC columns.
    for line in lines {
        if !order_rows::reserve_stock(conn, line.product_id, line.variant_id, line.quantity).await? {
            return Err(OrderError::InsufficientStock {
                product: line.product_name.clone(),
            });
        }
    }

    let totals = OrderTotals::compute(lines.iter().map(|l| (l.unit_price(), l.quantity)), shipping);
    let header = insert_with_unique_number(conn, purchaser, address_id, display_name, &totals, notes).await?;

    for line in lines {
        order_rows::insert_item(conn, header.id(), line).await?;
    }

    Ok(header.into_order()?)
}

/// Insert the header, retrying order number collisions inside a savepoint.
async fn insert_with_unique_number(
    conn: &mut PgConnection,
    purchaser: &Purchaser,
    address_id: Option<AddressId>,
    display_name: &str,
    totals: &OrderTotals,
    notes: &str,
) -> Result<OrderRowHandle, OrderError> {
    for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
        let order_number = number::generate(display_name);
        let new = NewOrder {
            order_number: &order_number,
            purchaser,
            address_id,
            totals,
            notes,
        };

        let mut savepoint = conn.begin().await?;
        match order_rows::insert_order(&mut savepoint, &new).await {
            Ok(row) => {
                savepoint.commit().await?;
                return Ok(row);
            }
            Err(e) if is_unique_violation_on(&e, ORDER_NUMBER_CONSTRAINT) => {
                savepoint.rollback().await?;
                tracing::warn!(attempt, %order_number, "order number collision");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(OrderError::OrderNumberExhausted)
}

/// Cancel a still-pending order and return its stock, inside the caller's
/// transaction. Returns whether anything changed.
///
/// # Errors
///
/// Returns `OrderError::Repository` if a query fails.
pub(crate) async fn release_pending(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<bool, OrderError> {
    let Some(order) = order_rows::lock_order(conn, id).await? else {
        return Ok(false);
    };
    if !order.status.is_cancellable() {
        return Ok(false);
    }
    order_rows::restore_stock(conn, id).await?;
    order_rows::write_status(conn, id, OrderStatus::Cancelled, None).await?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(items: Vec<GuestLine>) -> GuestOrderRequest {
        GuestOrderRequest {
            contact: GuestContact {
                name: "Siti Rahma".to_owned(),
                email: Email::parse("siti@example.com").unwrap(),
                phone: "08123456789".to_owned(),
                address: "Jl. Merdeka 1, Bandung".to_owned(),
            },
            items,
            notes: String::new(),
        }
    }

    fn line(quantity: i32) -> GuestLine {
        GuestLine {
            product_id: ProductId::generate(),
            variant_id: None,
            quantity,
        }
    }

    #[test]
    fn test_guest_request_requires_items() {
        assert!(matches!(request(vec![]).validate(), Err(OrderError::NoItems)));
    }

    #[test]
    fn test_guest_request_rejects_zero_quantity() {
        assert!(matches!(
            request(vec![line(1), line(0)]).validate(),
            Err(OrderError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_guest_request_requires_contact_fields() {
        let mut r = request(vec![line(1)]);
        r.contact.phone = "  ".to_owned();
        assert!(matches!(r.validate(), Err(OrderError::InvalidGuest(_))));
    }

    #[test]
    fn test_guest_request_ok() {
        assert!(request(vec![line(2)]).validate().is_ok());
    }

    #[test]
    fn test_error_messages_name_the_product() {
        let err = OrderError::InsufficientStock {
            product: "Batik Shirt".to_owned(),
        };
        assert_eq!(err.to_string(), "insufficient stock for Batik Shirt");
    }
}
