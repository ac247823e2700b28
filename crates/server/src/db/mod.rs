//! Storage for accounts, the ledger, the catalog and shop snapshots.
//!
//! # Backends
//!
//! - [`postgres::PgStore`] - `PostgreSQL` (production)
//! - [`memory::MemoryStore`] - in-process maps with the same semantics (tests
//!   and `DUB_STORE=memory` local development)
//!
//! Services only see the [`Store`] trait.
//!
//! # Concurrency
//!
//! Every account carries a `version`. [`Store::commit`] writes a batch of
//! accounts and ledger entries in one transaction, and only if each account's
//! stored version still equals the version it was loaded with. A lost race
//! surfaces as [`RepositoryError::VersionConflict`]; nothing is retried here.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p dub-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use dub_core::{
    Account, CatalogItem, CosmeticId, Email, ExternalId, LedgerEntry, NewLedgerEntry,
    NewShopSnapshot, ShopSnapshot,
};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The account changed since it was loaded.
    #[error("account {0} was modified concurrently")]
    VersionConflict(ExternalId),

    /// Injected failure (in-memory store only).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A full account state to persist, guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct AccountWrite {
    pub account: Account,
}

impl AccountWrite {
    #[must_use]
    pub const fn new(account: Account) -> Self {
        Self { account }
    }

    /// The version the stored row must still have.
    #[must_use]
    pub const fn expected_version(&self) -> i64 {
        self.account.version
    }
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct EconomyStats {
    pub total_accounts: i64,
    pub banned_accounts: i64,
    pub admins: i64,
    pub elite_donors: i64,
    pub full_locker_holders: i64,
    pub boosters: i64,
    pub total_entries: i64,
    pub purchases: i64,
    /// Vbucks debited by purchases and gifts.
    pub vbucks_spent: i64,
    /// Sum of all balances.
    pub vbucks_in_circulation: i64,
    pub active_shops: i64,
    pub catalog_size: i64,
}

/// Persistence seam used by every service.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // =========================================================================
    // Accounts
    // =========================================================================

    async fn get_account(&self, id: &ExternalId) -> Result<Option<Account>, RepositoryError>;

    /// Load an account with its password hash, for login.
    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError>;

    /// Insert a new account together with its opening ledger entries.
    ///
    /// Returns `Conflict("email")` or `Conflict("external id")` on duplicates.
    async fn create_account(
        &self,
        account: &Account,
        password_hash: &str,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Account, RepositoryError>;

    async fn record_login(
        &self,
        id: &ExternalId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Atomically write every account (version-checked) and append every
    /// entry. Returns the committed accounts, in order, with bumped versions.
    async fn commit(
        &self,
        writes: Vec<AccountWrite>,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Vec<Account>, RepositoryError>;

    /// Remove an account and its ledger entries. Returns `false` if absent.
    async fn delete_account(&self, id: &ExternalId) -> Result<bool, RepositoryError>;

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Entries for one account, newest first.
    async fn list_entries(
        &self,
        id: &ExternalId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;

    async fn count_entries(&self, id: &ExternalId) -> Result<i64, RepositoryError>;

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn get_cosmetic(&self, id: &CosmeticId) -> Result<Option<CatalogItem>, RepositoryError>;

    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, RepositoryError>;

    async fn upsert_cosmetic(&self, item: &CatalogItem) -> Result<(), RepositoryError>;

    // =========================================================================
    // Shop
    // =========================================================================

    /// The snapshot flagged active, expired or not.
    async fn active_shop(&self) -> Result<Option<ShopSnapshot>, RepositoryError>;

    /// Supersede the active snapshot (if any) and store `new` as active, in
    /// one transaction.
    async fn replace_active_shop(
        &self,
        new: NewShopSnapshot,
    ) -> Result<ShopSnapshot, RepositoryError>;

    /// Snapshots, newest first.
    async fn shop_history(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ShopSnapshot>, RepositoryError>;

    // =========================================================================
    // Stats
    // =========================================================================

    async fn economy_stats(&self) -> Result<EconomyStats, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
