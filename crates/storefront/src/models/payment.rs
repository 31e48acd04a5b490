//! Payment records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nexora_core::{OrderId, PaymentId, PaymentStatus, Price};

/// One checkout attempt with the payment processor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Order id as known to the processor.
    pub external_order_id: String,
    pub status: PaymentStatus,
    pub amount: Price,
    pub method: Option<String>,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A pending payment with a session token can be handed out again.
    #[must_use]
    pub fn live_session(&self) -> Option<(&str, &str)> {
        if self.status != PaymentStatus::Pending {
            return None;
        }
        match (self.snap_token.as_deref(), self.redirect_url.as_deref()) {
            (Some(token), Some(url)) if !token.is_empty() => Some((token, url)),
            _ => None,
        }
    }
}
