//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::auth::TokenSigner;
use crate::services::catalog::CategoryCache;
use crate::services::oauth::{GoogleClient, OAuthError};
use crate::services::orders::OrderService;
use crate::services::payments::{MidtransClient, PaymentGatewayError, PaymentService};

/// Error building the outbound HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] PaymentGatewayError),
    #[error("google client: {0}")]
    OAuth(#[from] OAuthError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    tokens: TokenSigner,
    midtrans: MidtransClient,
    google: Option<GoogleClient>,
    categories: CategoryCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let midtrans = MidtransClient::new(&config.midtrans)?;
        Self::with_gateway(config, pool, midtrans)
    }

    /// Create state around an existing payment gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the Google client cannot be built.
    pub fn with_gateway(
        config: StorefrontConfig,
        pool: PgPool,
        midtrans: MidtransClient,
    ) -> Result<Self, StateError> {
        let google = config.google.as_ref().map(GoogleClient::new).transpose()?;
        let tokens = TokenSigner::new(config.token_secret.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                midtrans,
                google,
                categories: CategoryCache::default(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Bearer token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// Google client, when sign-in is configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryCache {
        &self.inner.categories
    }

    /// Order engine bound to this state's pool and shipping rules.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(&self.inner.pool, &self.inner.config.shop.shipping)
    }

    /// Payment adapter bound to this state's gateway and policy.
    #[must_use]
    pub fn payments(&self) -> PaymentService<'_> {
        let config = &self.inner.config;
        PaymentService::new(
            &self.inner.pool,
            &self.inner.midtrans,
            &config.midtrans,
            &config.frontend_url,
            config.shop.payment_failure,
        )
    }
}
