//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /ready                          - Store connectivity check
//!
//! # Auth
//! POST /api/auth/register              - Create an account
//! POST /api/auth/login                 - Exchange email + password for a token
//! GET  /api/auth/verify                - Token validity and ban state
//!
//! # Account (bearer token)
//! GET  /api/user/profile               - Profile and counts
//! GET  /api/user/locker                - Locker grouped by category
//! GET  /api/user/balance               - Current balance
//! POST /api/user/buy                   - Buy an item from the live shop
//! POST /api/user/gift                  - Buy an item for another account
//! GET  /api/user/transactions          - Paginated ledger
//!
//! # Rewards (bearer token)
//! GET  /api/rewards                    - Claimable rewards and claim flags
//! POST /api/rewards/claim/{kind}       - Claim a reward
//!
//! # Shop
//! GET  /api/shop/current               - Live snapshot and time remaining
//! GET  /api/shop/history               - Past snapshots
//! GET  /api/shop/item/{id}             - Catalog lookup
//!
//! # Admin (admin bearer token)
//! POST   /api/admin/ban                - Ban an account
//! POST   /api/admin/unban              - Lift a ban
//! POST   /api/admin/give-vbucks        - Credit vbucks
//! POST   /api/admin/set-vbucks         - Overwrite a balance
//! POST   /api/admin/give-item          - Grant a catalog item
//! POST   /api/admin/remove-item        - Remove a locker item
//! GET    /api/admin/accounts/{id}      - Account with recent ledger entries
//! DELETE /api/admin/accounts/{id}      - Delete an account and its ledger
//! POST   /api/admin/refresh-shop       - Rotate the shop now
//! GET    /api/admin/stats              - Economy counters
//! ```

pub mod admin;
pub mod auth;
pub mod rewards;
pub mod shop;
pub mod user;

use axum::{
    Router,
    routing::{get, post},
};

use dub_core::{Category, CosmeticId, ExternalId};

use crate::error::AppError;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify", get(auth::verify))
}

/// Create the account routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(user::profile))
        .route("/locker", get(user::locker))
        .route("/balance", get(user::balance))
        .route("/buy", post(user::buy))
        .route("/gift", post(user::gift))
        .route("/transactions", get(user::transactions))
}

/// Create the reward routes router.
pub fn reward_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(rewards::available))
        .route("/claim/{kind}", post(rewards::claim))
}

/// Create the shop routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/current", get(shop::current))
        .route("/history", get(shop::history))
        .route("/item/{id}", get(shop::item))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/ban", post(admin::ban))
        .route("/unban", post(admin::unban))
        .route("/give-vbucks", post(admin::give_vbucks))
        .route("/set-vbucks", post(admin::set_vbucks))
        .route("/give-item", post(admin::give_item))
        .route("/remove-item", post(admin::remove_item))
        .route(
            "/accounts/{id}",
            get(admin::view_account).delete(admin::delete_account),
        )
        .route("/refresh-shop", post(admin::refresh_shop))
        .route("/stats", get(admin::stats))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/user", user_routes())
        .nest("/api/rewards", reward_routes())
        .nest("/api/shop", shop_routes())
        .nest("/api/admin", admin_routes())
}

// ============================================================================
// Input parsing
// ============================================================================

fn external_id(raw: &str) -> Result<ExternalId, AppError> {
    ExternalId::parse(raw.trim()).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn cosmetic_id(raw: &str) -> Result<CosmeticId, AppError> {
    CosmeticId::parse(raw.trim()).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn category(raw: &str) -> Result<Category, AppError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|e: dub_core::ParseEnumError| AppError::BadRequest(e.to_string()))
}
