//! Order persistence.
//!
//! Free functions taking `&mut PgConnection` are the building blocks of the
//! order engine's transactions; [`OrderRepository`] serves pool-level reads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use nexora_core::{
    AddressId, CartItemId, Email, GuestContact, OrderId, OrderStatus, OrderTotals, Price, ProductId,
    Purchaser, UserId, VariantId,
};

use super::{Page, RepositoryError, addresses, payments};
use crate::models::{Order, OrderDetail, OrderItem, OrderListEntry};

/// Constraint backing order number uniqueness.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.address_id, o.guest_name, \
     o.guest_email, o.guest_phone, o.guest_address, o.status, o.subtotal, o.shipping_fee, \
     o.total, o.notes, o.tracking_number, o.shipped_at, o.delivered_at, o.created_at, \
     o.updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    address_id: Option<AddressId>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    guest_address: Option<String>,
    status: OrderStatus,
    subtotal: Price,
    shipping_fee: Price,
    total: Price,
    notes: String,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let purchaser = match (r.user_id, r.guest_email) {
            (Some(user_id), None) => Purchaser::Registered { user_id },
            (None, Some(email)) => {
                let email = Email::parse(&email).map_err(|e| {
                    RepositoryError::DataCorruption(format!("order {}: invalid guest email: {e}", r.id))
                })?;
                Purchaser::Guest(GuestContact {
                    name: r.guest_name.unwrap_or_default(),
                    email,
                    phone: r.guest_phone.unwrap_or_default(),
                    address: r.guest_address.unwrap_or_default(),
                })
            }
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {} must have exactly one purchaser",
                    r.id
                )));
            }
        };

        Ok(Self {
            id: r.id,
            order_number: r.order_number,
            purchaser,
            address_id: r.address_id,
            status: r.status,
            subtotal: r.subtotal,
            shipping_fee: r.shipping_fee,
            total: r.total,
            notes: r.notes,
            tracking_number: r.tracking_number,
            shipped_at: r.shipped_at,
            delivered_at: r.delivered_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// A line resolved against current catalog data, ready to be ordered.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogLine {
    /// Cart row the line was read from; `None` for guest lines.
    #[sqlx(default)]
    pub cart_item_id: Option<CartItemId>,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub base_price: Price,
    pub variant_name: Option<String>,
    pub variant_value: Option<String>,
    pub price_modifier: Option<Decimal>,
    /// Product is active and not deleted.
    pub purchasable: bool,
    pub quantity: i32,
}

impl CatalogLine {
    /// Base price plus the variant modifier.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.base_price
            .with_modifier(self.price_modifier.unwrap_or_default())
    }

    /// `Name: Value` snapshot of the chosen variant.
    #[must_use]
    pub fn variant_info(&self) -> Option<String> {
        match (&self.variant_name, &self.variant_value) {
            (Some(name), Some(value)) => Some(crate::models::ProductVariant::describe(name, value)),
            _ => None,
        }
    }
}

/// Header of an order about to be inserted.
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub purchaser: &'a Purchaser,
    pub address_id: Option<AddressId>,
    pub totals: &'a OrderTotals,
    pub notes: &'a str,
}

// =============================================================================
// Transaction building blocks
// =============================================================================

/// Lock and price the user's cart lines.
///
/// The row locks make a concurrent checkout of the same cart wait and then
/// find it empty.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn lock_cart_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CatalogLine>, sqlx::Error> {
    sqlx::query_as(
        r"
        SELECT ci.id AS cart_item_id, ci.product_id, ci.variant_id,
               p.name AS product_name, p.base_price,
               v.name AS variant_name, v.value AS variant_value, v.price_modifier,
               (p.is_active AND p.deleted_at IS NULL) AS purchasable,
               ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        LEFT JOIN product_variants v ON v.id = ci.variant_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        FOR UPDATE OF ci
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

/// Resolve an explicitly requested product/variant pair.
///
/// Returns `None` when the product does not exist or the variant does not
/// belong to it.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn resolve_line(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<Option<CatalogLine>, sqlx::Error> {
    sqlx::query_as(
        r"
        SELECT p.id AS product_id, v.id AS variant_id, p.name AS product_name, p.base_price,
               v.name AS variant_name, v.value AS variant_value, v.price_modifier,
               (p.is_active AND p.deleted_at IS NULL) AS purchasable,
               $3::INT AS quantity
        FROM products p
        LEFT JOIN product_variants v ON v.id = $2 AND v.product_id = p.id
        WHERE p.id = $1 AND ($2::UUID IS NULL OR v.id IS NOT NULL)
        ",
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(quantity)
    .fetch_optional(conn)
    .await
}

/// Insert the order header.
///
/// Returns the raw `sqlx::Error` so callers can spot an order number clash.
///
/// # Errors
///
/// Returns `sqlx::Error` if the insert fails.
pub async fn insert_order(
    conn: &mut PgConnection,
    new: &NewOrder<'_>,
) -> Result<OrderRowHandle, sqlx::Error> {
    let (user_id, guest) = match new.purchaser {
        Purchaser::Registered { user_id } => (Some(*user_id), None),
        Purchaser::Guest(contact) => (None, Some(contact)),
    };

    let row: OrderRow = sqlx::query_as(&format!(
        r"
        INSERT INTO orders AS o
            (order_number, user_id, address_id, guest_name, guest_email, guest_phone,
             guest_address, subtotal, shipping_fee, total, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(new.order_number)
    .bind(user_id)
    .bind(new.address_id)
    .bind(guest.map(|g| g.name.as_str()))
    .bind(guest.map(|g| g.email.as_str()))
    .bind(guest.map(|g| g.phone.as_str()))
    .bind(guest.map(|g| g.address.as_str()))
    .bind(new.totals.subtotal)
    .bind(new.totals.shipping_fee)
    .bind(new.totals.total)
    .bind(new.notes)
    .fetch_one(conn)
    .await?;

    Ok(OrderRowHandle(row))
}

/// Freshly inserted order row, converted once the transaction is done.
pub struct OrderRowHandle(OrderRow);

impl OrderRowHandle {
    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.0.id
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row is inconsistent.
    pub fn into_order(self) -> Result<Order, RepositoryError> {
        Order::try_from(self.0)
    }
}

/// Insert one snapshot line.
///
/// # Errors
///
/// Returns `sqlx::Error` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    line: &CatalogLine,
) -> Result<(), sqlx::Error> {
    let unit_price = line.unit_price();
    sqlx::query(
        r"
        INSERT INTO order_items
            (order_id, product_id, variant_id, product_name, variant_info,
             unit_price, quantity, line_total)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.variant_id)
    .bind(&line.product_name)
    .bind(line.variant_info())
    .bind(unit_price)
    .bind(line.quantity)
    .bind(unit_price * line.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Take `quantity` units of a product (and its variant) if enough remain.
///
/// The conditional `UPDATE` is the only stock check, so two buyers racing
/// for the last unit cannot both win. Returns `false` when stock is short.
///
/// # Errors
///
/// Returns `sqlx::Error` if an update fails.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<bool, sqlx::Error> {
    let product = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    if product.rows_affected() == 0 {
        return Ok(false);
    }

    if let Some(variant_id) = variant_id {
        let variant = sqlx::query(
            "UPDATE product_variants SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
        )
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
        if variant.rows_affected() == 0 {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Put back the stock of every line of an order.
///
/// # Errors
///
/// Returns `sqlx::Error` if an update fails.
pub async fn restore_stock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE products p
        SET stock = p.stock + s.quantity, updated_at = NOW()
        FROM (
            SELECT product_id, SUM(quantity)::INT AS quantity
            FROM order_items
            WHERE order_id = $1 AND product_id IS NOT NULL
            GROUP BY product_id
        ) s
        WHERE p.id = s.product_id
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE product_variants v
        SET stock = v.stock + s.quantity
        FROM (
            SELECT variant_id, SUM(quantity)::INT AS quantity
            FROM order_items
            WHERE order_id = $1 AND variant_id IS NOT NULL
            GROUP BY variant_id
        ) s
        WHERE v.id = s.variant_id
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete the cart rows that were ordered. Rows added after the lock was
/// taken stay in the cart.
///
/// # Errors
///
/// Returns `sqlx::Error` if the delete fails.
pub async fn clear_cart_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    lines: &[CatalogLine],
) -> Result<(), sqlx::Error> {
    let ids: Vec<CartItemId> = lines.iter().filter_map(|l| l.cart_item_id).collect();
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
        .bind(user_id)
        .bind(&ids)
        .execute(conn)
        .await?;
    Ok(())
}

/// Lock an order row for a status change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Write a new status, stamping shipped/delivered times the first time.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn write_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    tracking_number: Option<&str>,
) -> Result<Order, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE orders o
        SET status = $2,
            tracking_number = COALESCE($3, o.tracking_number),
            shipped_at = CASE
                WHEN $2 = 'shipped'::order_status THEN COALESCE(o.shipped_at, NOW())
                ELSE o.shipped_at END,
            delivered_at = CASE
                WHEN $2 = 'delivered'::order_status THEN COALESCE(o.delivered_at, NOW())
                ELSE o.delivered_at END,
            updated_at = NOW()
        WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(tracking_number)
    .fetch_optional(conn)
    .await?;

    row.map(Order::try_from)
        .transpose()?
        .ok_or(RepositoryError::NotFound)
}

/// Advance an order to `paid`, only if it is still `pending`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the update fails.
pub async fn mark_paid_if_pending(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', updated_at = NOW() WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Reads
// =============================================================================

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch an order visible to the requester: its owner, or anyone when
    /// `as_admin` is set. Foreign orders look exactly like missing ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_visible(
        &self,
        id: OrderId,
        requester: UserId,
        as_admin: bool,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 AND ($3 OR o.user_id = $2)"
        ))
        .bind(id)
        .bind(requester)
        .bind(as_admin)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Fetch any order by id, for flows with their own authorization
    /// (guest payments, webhook reconciliation).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    /// Look an order up by its number and the purchaser's email, for order
    /// tracking without an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, email))]
    pub async fn find_for_tracking(
        &self,
        order_number: &str,
        email: &Email,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            LEFT JOIN users u ON u.id = o.user_id
            WHERE o.order_number = $1
              AND (o.guest_email = $2 OR u.email = $2)
            "
        ))
        .bind(order_number.trim().to_uppercase())
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Items, shipping address and latest payment of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let items = items_of(&mut *conn, order.id).await?;
        let address = match order.address_id {
            Some(address_id) => addresses::find_by_id(&mut *conn, address_id).await?,
            None => None,
        };
        let payment = payments::latest_for_order(&mut *conn, order.id).await?;

        Ok(OrderDetail {
            order,
            items,
            address,
            payment,
        })
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<OrderListEntry>, i64), RepositoryError> {
        self.list(Some(user_id), None, page).await
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<(Vec<OrderListEntry>, i64), RepositoryError> {
        self.list(None, status, page).await
    }

    async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<(Vec<OrderListEntry>, i64), RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            order: OrderRow,
            item_count: i64,
            purchaser_name: String,
        }

        fn push_where(qb: &mut QueryBuilder<'_, Postgres>, user_id: Option<UserId>, status: Option<OrderStatus>) {
            qb.push(" WHERE TRUE");
            if let Some(user_id) = user_id {
                qb.push(" AND o.user_id = ").push_bind(user_id);
            }
            if let Some(status) = status {
                qb.push(" AND o.status = ").push_bind(status);
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            r"
            SELECT {ORDER_COLUMNS},
                   (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS item_count,
                   COALESCE(u.name, o.guest_name, '') AS purchaser_name
            FROM orders o
            LEFT JOIN users u ON u.id = o.user_id
            "
        ));
        push_where(&mut qb, user_id, status);
        qb.push(" ORDER BY o.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<Row> = qb.build_query_as().fetch_all(self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_where(&mut count, user_id, status);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let entries = rows
            .into_iter()
            .map(|r| {
                Ok(OrderListEntry {
                    order: Order::try_from(r.order)?,
                    item_count: r.item_count,
                    purchaser_name: r.purchaser_name,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok((entries, total))
    }
}

/// Line items of an order in insertion order.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn items_of(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        r"
        SELECT id, order_id, product_id, variant_id, product_name, variant_info,
               unit_price, quantity, line_total
        FROM order_items
        WHERE order_id = $1
        ORDER BY product_name, id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(modifier: Option<Decimal>, variant: Option<(&str, &str)>) -> CatalogLine {
        CatalogLine {
            cart_item_id: None,
            product_id: ProductId::generate(),
            variant_id: variant.map(|_| VariantId::generate()),
            product_name: "Linen Shirt".to_owned(),
            base_price: Price::from_major(100_000),
            variant_name: variant.map(|(n, _)| n.to_owned()),
            variant_value: variant.map(|(_, v)| v.to_owned()),
            price_modifier: modifier,
            purchasable: true,
            quantity: 2,
        }
    }

    #[test]
    fn test_unit_price_without_variant_is_base_price() {
        assert_eq!(line(None, None).unit_price(), Price::from_major(100_000));
    }

    #[test]
    fn test_unit_price_applies_modifier() {
        let l = line(Some(Decimal::from(25_000)), Some(("Size", "XL")));
        assert_eq!(l.unit_price(), Price::from_major(125_000));
    }

    #[test]
    fn test_variant_info_snapshot() {
        assert_eq!(
            line(None, Some(("Size", "XL"))).variant_info().as_deref(),
            Some("Size: XL")
        );
        assert!(line(None, None).variant_info().is_none());
    }
}
