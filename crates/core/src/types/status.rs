//! Status enums and the rules for moving between them.

use serde::{Deserialize, Serialize};

/// Error returned when parsing a status or role from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Account role carried in bearer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    #[default]
    Customer,
    /// Store staff with access to the admin endpoints.
    Admin,
}

impl Role {
    /// Whether this role may use privileged operations.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseStatusError::new("role", s)),
        }
    }
}

/// Order lifecycle.
///
/// `pending -> paid -> processing -> shipped -> delivered`, with
/// `cancelled` reachable from `pending` by the purchaser and from any
/// status by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses that count towards revenue on the dashboard.
    pub const REVENUE: [Self; 4] = [Self::Paid, Self::Processing, Self::Shipped, Self::Delivered];

    /// Purchasers may only cancel orders nobody has paid for yet.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether revenue has been realised for an order in this status.
    #[must_use]
    pub const fn counts_as_revenue(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Whether an admin may move an order from `self` to `next`.
    ///
    /// A cancelled order has already had its stock returned, so it cannot be
    /// revived.
    #[must_use]
    pub fn admin_can_transition_to(self, next: Self) -> bool {
        self != Self::Cancelled || next == Self::Cancelled
    }

    /// Whether moving to `next` must put the order's stock back.
    #[must_use]
    pub fn restores_stock_on(self, next: Self) -> bool {
        next == Self::Cancelled && self != Self::Cancelled
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseStatusError::new("order status", s)),
        }
    }
}

/// Local payment record status.
///
/// Only the processor callback (or the sandbox simulation) moves a payment
/// out of `pending`, and it never moves again afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// Whether the payment has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Transaction status reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Refund,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    /// Parse the processor's wire value; unrecognised values map to `Unknown`.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "capture" => Self::Capture,
            "settlement" => Self::Settlement,
            "pending" => Self::Pending,
            "deny" => Self::Deny,
            "cancel" => Self::Cancel,
            "expire" => Self::Expire,
            "refund" => Self::Refund,
            _ => Self::Unknown,
        }
    }

    /// The local payment status this notification settles on, if any.
    ///
    /// `None` means the notification is acknowledged without changing state.
    #[must_use]
    pub const fn settles_as(self) -> Option<PaymentStatus> {
        match self {
            Self::Capture | Self::Settlement => Some(PaymentStatus::Success),
            Self::Deny | Self::Cancel => Some(PaymentStatus::Failed),
            Self::Expire => Some(PaymentStatus::Expired),
            Self::Pending | Self::Refund | Self::Unknown => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_is_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        for status in [
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert!(!status.is_cancellable(), "{status} must not be cancellable");
        }
    }

    #[test]
    fn test_cancelled_is_final_for_admins() {
        assert!(!OrderStatus::Cancelled.admin_can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.admin_can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Cancelled.admin_can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.admin_can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_stock_restored_once() {
        assert!(OrderStatus::Paid.restores_stock_on(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.restores_stock_on(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.restores_stock_on(OrderStatus::Shipped));
    }

    #[test]
    fn test_revenue_statuses() {
        assert!(OrderStatus::REVENUE.iter().all(|s| s.counts_as_revenue()));
        assert!(!OrderStatus::Pending.counts_as_revenue());
        assert!(!OrderStatus::Cancelled.counts_as_revenue());
    }

    #[test]
    fn test_order_status_text_roundtrip() {
        for status in [OrderStatus::Pending, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_transaction_status_mapping() {
        assert_eq!(
            TransactionStatus::from_wire("settlement").settles_as(),
            Some(PaymentStatus::Success)
        );
        assert_eq!(
            TransactionStatus::from_wire("capture").settles_as(),
            Some(PaymentStatus::Success)
        );
        assert_eq!(
            TransactionStatus::from_wire("deny").settles_as(),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(
            TransactionStatus::from_wire("cancel").settles_as(),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(
            TransactionStatus::from_wire("expire").settles_as(),
            Some(PaymentStatus::Expired)
        );
        assert_eq!(TransactionStatus::from_wire("pending").settles_as(), None);
        assert_eq!(TransactionStatus::from_wire("authorize"), TransactionStatus::Unknown);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }
}
