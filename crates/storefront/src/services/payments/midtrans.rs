//! Midtrans Snap client.
//!
//! Only session creation goes over the wire. Settlement arrives later as a
//! signed notification, see [`super::signature`].

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::MidtransConfig;

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("payment gateway timed out")]
    Timeout,

    #[error("could not connect to payment gateway")]
    Connect,

    #[error("payment gateway request failed: {0}")]
    Request(reqwest::Error),

    #[error("payment gateway rejected the request (status {status})")]
    Rejected { status: u16, body: String },

    /// The response parsed but carried no usable token.
    #[error("payment gateway returned no session token")]
    MissingToken,

    #[error("invalid payment gateway response: {0}")]
    InvalidResponse(String),
}

impl PaymentGatewayError {
    /// Timeouts and connection failures are worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect)
    }
}

impl From<reqwest::Error> for PaymentGatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else {
            Self::Request(err)
        }
    }
}

/// What to charge, and for whom.
#[derive(Debug, Clone)]
pub struct SnapRequest<'a> {
    pub order_id: &'a str,
    pub gross_amount: i64,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub finish_url: &'a str,
}

/// A hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapSession {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Serialize)]
struct SnapBody<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
    callbacks: Callbacks<'a>,
}

#[derive(Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct Callbacks<'a> {
    finish: &'a str,
}

impl<'a> From<&SnapRequest<'a>> for SnapBody<'a> {
    fn from(req: &SnapRequest<'a>) -> Self {
        Self {
            transaction_details: TransactionDetails {
                order_id: req.order_id,
                gross_amount: req.gross_amount,
            },
            customer_details: CustomerDetails {
                first_name: req.customer_name,
                email: req.customer_email,
            },
            callbacks: Callbacks {
                finish: req.finish_url,
            },
        }
    }
}

#[derive(Deserialize)]
struct SnapResponse {
    token: Option<String>,
    redirect_url: Option<String>,
}

/// Client for the Snap transactions API.
#[derive(Clone)]
pub struct MidtransClient {
    inner: Arc<MidtransClientInner>,
}

struct MidtransClientInner {
    client: reqwest::Client,
    server_key: SecretString,
    endpoint: String,
}

impl MidtransClient {
    /// # Errors
    ///
    /// Returns `PaymentGatewayError::Request` if the HTTP client cannot be built.
    pub fn new(config: &MidtransConfig) -> Result<Self, PaymentGatewayError> {
        Self::with_base_url(config, config.snap_base_url())
    }

    /// Client against an arbitrary base URL.
    ///
    /// # Errors
    ///
    /// Returns `PaymentGatewayError::Request` if the HTTP client cannot be built.
    pub fn with_base_url(
        config: &MidtransConfig,
        base_url: &str,
    ) -> Result<Self, PaymentGatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PaymentGatewayError::Request)?;
        Ok(Self {
            inner: Arc::new(MidtransClientInner {
                client,
                server_key: config.server_key.clone(),
                endpoint: format!("{}/snap/v1/transactions", base_url.trim_end_matches('/')),
            }),
        })
    }

    /// Open a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentGatewayError::Timeout`/`Connect` on network failure,
    /// `Rejected` on a non-2xx reply and `MissingToken` if no token came back.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = request.gross_amount))]
    pub async fn create_session(
        &self,
        request: &SnapRequest<'_>,
    ) -> Result<SnapSession, PaymentGatewayError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .basic_auth(self.inner.server_key.expose_secret(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&SnapBody::from(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(%status, %body, "snap transaction rejected");
            return Err(PaymentGatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        parse_session(&body)
    }
}

fn parse_session(body: &str) -> Result<SnapSession, PaymentGatewayError> {
    let parsed: SnapResponse = serde_json::from_str(body)
        .map_err(|e| PaymentGatewayError::InvalidResponse(e.to_string()))?;

    match (parsed.token, parsed.redirect_url) {
        (Some(token), Some(redirect_url)) if !token.is_empty() => {
            Ok(SnapSession { token, redirect_url })
        }
        _ => {
            tracing::error!(%body, "snap response without token");
            Err(PaymentGatewayError::MissingToken)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let req = SnapRequest {
            order_id: "NEXORA-1a2b3c4d-1700000000",
            gross_amount: 150_000,
            customer_name: "Siti",
            customer_email: "siti@example.com",
            finish_url: "http://localhost:3000/orders/1",
        };
        let json = serde_json::to_value(SnapBody::from(&req)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "transaction_details": {"order_id": "NEXORA-1a2b3c4d-1700000000", "gross_amount": 150_000},
                "customer_details": {"first_name": "Siti", "email": "siti@example.com"},
                "callbacks": {"finish": "http://localhost:3000/orders/1"}
            })
        );
    }

    #[test]
    fn test_parse_session() {
        let session =
            parse_session(r#"{"token":"abc","redirect_url":"https://app.sandbox.midtrans.com/x"}"#)
                .unwrap();
        assert_eq!(session.token, "abc");
    }

    #[test]
    fn test_parse_session_without_token() {
        assert!(matches!(
            parse_session(r#"{"error_messages":["bad key"]}"#),
            Err(PaymentGatewayError::MissingToken)
        ));
        assert!(matches!(
            parse_session(r#"{"token":"","redirect_url":"x"}"#),
            Err(PaymentGatewayError::MissingToken)
        ));
    }

    #[test]
    fn test_parse_session_garbage() {
        assert!(matches!(
            parse_session("<html>"),
            Err(PaymentGatewayError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentGatewayError::Timeout.is_retryable());
        assert!(PaymentGatewayError::Connect.is_retryable());
        assert!(!PaymentGatewayError::MissingToken.is_retryable());
    }
}
