//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{EconomyConfig, ServerConfig};
use crate::db::Store;
use crate::services::{EmailService, TokenSigner};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the token signer and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    tokens: TokenSigner,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email is disabled when `email` is `None`.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn Store>, email: Option<EmailService>) -> Self {
        let tokens = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                email,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn economy(&self) -> &EconomyConfig {
        &self.inner.config.economy
    }

    /// Borrow the store for a service call.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Shared handle to the store, for background tasks.
    #[must_use]
    pub fn store_handle(&self) -> Arc<dyn Store> {
        Arc::clone(&self.inner.store)
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// The email service, if email is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }
}
