//! Integration tests for the Dub economy server.
//!
//! Each [`TestContext`] serves the full router on an ephemeral local port,
//! backed by a fresh in-memory store, and talks to it over HTTP with
//! `reqwest`. No database or external service is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dub-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dub_core::{Availability, CatalogItem, CosmeticId, ExternalId, Introduction, ItemType, Rarity};
use dub_server::config::{EconomyConfig, ServerConfig, StoreConfig};
use dub_server::db::{Store, memory::MemoryStore};
use dub_server::services::{AdminService, RoleUpdate};
use dub_server::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "correct-horse-battery";

/// External id of the account [`TestContext::admin`] creates.
pub const ADMIN_ID: &str = "100000000000000001";

const TOKEN_SECRET: &str = "kQ7v!pZ2x#Lm9Rt4Wb8Nc3Yh6Jd1Fs5Ge0Ua";

/// A running server and a client pointed at it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    server: JoinHandle<()>,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl TestContext {
    /// Start a server with the default economy settings.
    pub async fn new() -> Self {
        Self::with_economy(EconomyConfig::default()).await
    }

    /// Start a server with custom economy settings.
    pub async fn with_economy(economy: EconomyConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();

        let config = ServerConfig {
            store: StoreConfig::Memory,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            token_secret: SecretString::from(TOKEN_SECRET.to_owned()),
            token_ttl: chrono::Duration::days(1),
            economy,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let app = dub_server::app(AppState::new(config, shared, None));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            store,
            server,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("DELETE request failed")
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Register `external_id` with a derived username and email.
    pub async fn register(&self, external_id: &str) -> Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "external_id": external_id,
                "username": format!("player{external_id}"),
                "email": email_for(external_id),
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    pub async fn login(&self, external_id: &str) -> Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email_for(external_id), "password": PASSWORD }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// Register and log in, returning the bearer token.
    pub async fn signup(&self, external_id: &str) -> String {
        let resp = self.register(external_id).await;
        assert_eq!(resp.status(), StatusCode::CREATED, "registration failed");
        self.token(external_id).await
    }

    /// Log in an existing account, returning the bearer token.
    pub async fn token(&self, external_id: &str) -> String {
        let resp = self.login(external_id).await;
        assert_eq!(resp.status(), StatusCode::OK, "login failed");
        let body: Value = resp.json().await.expect("Login body is not JSON");
        body["token"]
            .as_str()
            .expect("Login response has no token")
            .to_owned()
    }

    /// Sign up [`ADMIN_ID`] and promote it, returning its token.
    pub async fn admin(&self) -> String {
        let token = self.signup(ADMIN_ID).await;
        AdminService::new(self.store.as_ref())
            .set_admin(&external_id(ADMIN_ID), true)
            .await
            .expect("Failed to promote admin");
        token
    }

    /// Set role flags directly, as the role provider sync would.
    pub async fn set_roles(&self, raw: &str, update: RoleUpdate) {
        AdminService::new(self.store.as_ref())
            .set_roles(&external_id(raw), update)
            .await
            .expect("Failed to set roles");
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn seed(&self, items: &[CatalogItem]) {
        for item in items {
            self.store
                .upsert_cosmetic(item)
                .await
                .expect("Failed to seed catalog");
        }
    }
}

#[must_use]
pub fn email_for(external_id: &str) -> String {
    format!("{external_id}@example.com")
}

#[must_use]
pub fn external_id(raw: &str) -> ExternalId {
    ExternalId::parse(raw).expect("Invalid external id")
}

/// A shop-eligible catalog item.
#[must_use]
pub fn catalog_item(id: &str, item_type: ItemType, price: u64, version: &str) -> CatalogItem {
    CatalogItem {
        id: CosmeticId::parse(id).expect("Invalid cosmetic id"),
        name: format!("Item {id}"),
        description: None,
        item_type,
        rarity: Rarity::Rare,
        price,
        introduced: Introduction {
            season: version.split('.').next().unwrap_or(version).to_owned(),
            version: version.to_owned(),
            chapter: None,
        },
        availability: Availability::Shop,
    }
}
