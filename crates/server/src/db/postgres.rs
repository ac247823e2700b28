//! `PostgreSQL` store.
//!
//! Queries are checked at runtime and mapped through `FromRow` row types so
//! the crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::instrument;

use dub_core::{
    Account, Availability, BanState, CatalogItem, ClaimFlags, CosmeticId, Currency, Email,
    ExternalId, Introduction, ItemRef, ItemType, LedgerEntry, LedgerEntryId, LedgerKind, Locker,
    NewLedgerEntry, NewShopSnapshot, PaymentDetails, Rarity, RoleFlags, ShopEntry, ShopSnapshot,
    ShopSnapshotId,
};

use super::{AccountWrite, EconomyStats, RepositoryError, Store};

macro_rules! account_columns {
    () => {
        "external_id, username, email, balance, locker, \
         is_admin, is_elite_donor, has_full_locker, is_booster, \
         elite_donor_claimed, full_locker_claimed, booster_claimed, \
         banned_reason, banned_by, banned_at, version, created_at, last_login"
    };
}

macro_rules! entry_columns {
    () => {
        "id, account_id, kind, delta, currency, item, counterparty, description, payment, created_at"
    };
}

macro_rules! cosmetic_columns {
    () => {
        "id, name, description, item_type, rarity, price, season, version, chapter, availability"
    };
}

macro_rules! shop_columns {
    () => {
        "id, featured, daily, special, season, version, created_by, active, created_at, expires_at"
    };
}

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct AccountRow {
    external_id: ExternalId,
    username: String,
    email: String,
    balance: i64,
    locker: Json<Locker>,
    is_admin: bool,
    is_elite_donor: bool,
    has_full_locker: bool,
    is_booster: bool,
    elite_donor_claimed: bool,
    full_locker_claimed: bool,
    booster_claimed: bool,
    banned_reason: Option<String>,
    banned_by: Option<String>,
    banned_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let balance = u64::try_from(row.balance).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative balance for account {}",
                row.external_id
            ))
        })?;
        let ban = match (row.banned_reason, row.banned_by, row.banned_at) {
            (Some(reason), Some(banned_by), Some(banned_at)) => Some(BanState {
                reason,
                banned_by,
                banned_at,
            }),
            _ => None,
        };

        Ok(Self {
            external_id: row.external_id,
            username: row.username,
            email,
            balance,
            locker: row.locker.0,
            roles: RoleFlags {
                is_admin: row.is_admin,
                is_elite_donor: row.is_elite_donor,
                has_full_locker: row.has_full_locker,
                is_booster: row.is_booster,
            },
            claims: ClaimFlags {
                elite_donor_claimed: row.elite_donor_claimed,
                full_locker_claimed: row.full_locker_claimed,
                booster_claimed: row.booster_claimed,
            },
            ban,
            created_at: row.created_at,
            last_login: row.last_login,
            version: row.version,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

#[derive(FromRow)]
struct LedgerRow {
    id: LedgerEntryId,
    account_id: ExternalId,
    kind: LedgerKind,
    delta: i64,
    currency: Currency,
    item: Option<Json<ItemRef>>,
    counterparty: Option<ExternalId>,
    description: String,
    payment: Option<Json<PaymentDetails>>,
    created_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        Self {
            id: row.id,
            account: row.account_id,
            kind: row.kind,
            delta: row.delta,
            currency: row.currency,
            item: row.item.map(|item| item.0),
            counterparty: row.counterparty,
            description: row.description,
            payment: row.payment.map(|payment| payment.0),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CosmeticRow {
    id: CosmeticId,
    name: String,
    description: Option<String>,
    item_type: ItemType,
    rarity: Rarity,
    price: i64,
    season: String,
    version: String,
    chapter: Option<i32>,
    availability: Availability,
}

impl TryFrom<CosmeticRow> for CatalogItem {
    type Error = RepositoryError;

    fn try_from(row: CosmeticRow) -> Result<Self, Self::Error> {
        let price = u64::try_from(row.price).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative price for cosmetic {}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            item_type: row.item_type,
            rarity: row.rarity,
            price,
            introduced: Introduction {
                season: row.season,
                version: row.version,
                chapter: row.chapter,
            },
            availability: row.availability,
        })
    }
}

#[derive(FromRow)]
struct ShopRow {
    id: ShopSnapshotId,
    featured: Json<Vec<ShopEntry>>,
    daily: Json<Vec<ShopEntry>>,
    special: Json<Vec<ShopEntry>>,
    season: String,
    version: String,
    created_by: String,
    active: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<ShopRow> for ShopSnapshot {
    fn from(row: ShopRow) -> Self {
        Self {
            id: row.id,
            featured: row.featured.0,
            daily: row.daily.0,
            special: row.special.0,
            created_at: row.created_at,
            expires_at: row.expires_at,
            active: row.active,
            season: row.season,
            version: row.version,
            created_by: row.created_by,
        }
    }
}

fn to_bigint(value: u64, what: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{what} exceeds BIGINT range")))
}

async fn insert_entry(
    conn: &mut PgConnection,
    entry: &NewLedgerEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO ledger_entry
            (account_id, kind, delta, currency, item, counterparty, description, payment)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(&entry.account)
    .bind(entry.kind)
    .bind(entry.delta)
    .bind(entry.currency)
    .bind(entry.item.as_ref().map(Json))
    .bind(entry.counterparty.as_ref())
    .bind(&entry.description)
    .bind(entry.payment.as_ref().map(Json))
    .execute(conn)
    .await?;
    Ok(())
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_account(&self, id: &ExternalId) -> Result<Option<Account>, RepositoryError> {
        let row: Option<AccountRow> = sqlx::query_as(concat!(
            "SELECT ",
            account_columns!(),
            " FROM account WHERE external_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let row: Option<CredentialsRow> = sqlx::query_as(concat!(
            "SELECT ",
            account_columns!(),
            ", password_hash FROM account WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((Account::try_from(r.account)?, r.password_hash)))
            .transpose()
    }

    #[instrument(skip(self, account, password_hash, entries), fields(external_id = %account.external_id))]
    async fn create_account(
        &self,
        account: &Account,
        password_hash: &str,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Account, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: AccountRow = sqlx::query_as(concat!(
            r"
            INSERT INTO account (external_id, username, email, password_hash, balance, locker, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING ",
            account_columns!()
        ))
        .bind(&account.external_id)
        .bind(&account.username)
        .bind(account.email.as_str())
        .bind(password_hash)
        .bind(to_bigint(account.balance, "balance")?)
        .bind(Json(&account.locker))
        .bind(account.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                let field = if db_err.constraint() == Some("account_email_key") {
                    "email"
                } else {
                    "external id"
                };
                return RepositoryError::Conflict(field.to_owned());
            }
            RepositoryError::Database(e)
        })?;

        for entry in &entries {
            insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Account::try_from(row)
    }

    async fn record_login(
        &self,
        id: &ExternalId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE account SET last_login = $2 WHERE external_id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(writes = writes.len(), entries = entries.len()))]
    async fn commit(
        &self,
        writes: Vec<AccountWrite>,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Vec<Account>, RepositoryError> {
        // Lock rows in key order so two opposing gifts cannot deadlock.
        let mut ordered: Vec<(usize, AccountWrite)> = writes.into_iter().enumerate().collect();
        ordered.sort_by(|(_, a), (_, b)| a.account.external_id.cmp(&b.account.external_id));

        let mut tx = self.pool.begin().await?;
        let mut committed = Vec::with_capacity(ordered.len());

        for (index, write) in ordered {
            let expected = write.expected_version();
            let account = write.account;
            let ban = account.ban.as_ref();

            let result = sqlx::query(
                r"
                UPDATE account SET
                    balance = $3,
                    locker = $4,
                    is_admin = $5,
                    is_elite_donor = $6,
                    has_full_locker = $7,
                    is_booster = $8,
                    elite_donor_claimed = $9,
                    full_locker_claimed = $10,
                    booster_claimed = $11,
                    banned_reason = $12,
                    banned_by = $13,
                    banned_at = $14,
                    version = version + 1
                WHERE external_id = $1 AND version = $2
                ",
            )
            .bind(&account.external_id)
            .bind(expected)
            .bind(to_bigint(account.balance, "balance")?)
            .bind(Json(&account.locker))
            .bind(account.roles.is_admin)
            .bind(account.roles.is_elite_donor)
            .bind(account.roles.has_full_locker)
            .bind(account.roles.is_booster)
            .bind(account.claims.elite_donor_claimed)
            .bind(account.claims.full_locker_claimed)
            .bind(account.claims.booster_claimed)
            .bind(ban.map(|b| b.reason.as_str()))
            .bind(ban.map(|b| b.banned_by.as_str()))
            .bind(ban.map(|b| b.banned_at))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::VersionConflict(account.external_id));
            }

            committed.push((
                index,
                Account {
                    version: expected + 1,
                    ..account
                },
            ));
        }

        for entry in &entries {
            insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;

        committed.sort_by_key(|(index, _)| *index);
        Ok(committed.into_iter().map(|(_, account)| account).collect())
    }

    async fn delete_account(&self, id: &ExternalId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM account WHERE external_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_entries(
        &self,
        id: &ExternalId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows: Vec<LedgerRow> = sqlx::query_as(concat!(
            "SELECT ",
            entry_columns!(),
            " FROM ledger_entry WHERE account_id = $1
              ORDER BY created_at DESC, id DESC
              OFFSET $2 LIMIT $3"
        ))
        .bind(id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    async fn count_entries(&self, id: &ExternalId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entry WHERE account_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_cosmetic(&self, id: &CosmeticId) -> Result<Option<CatalogItem>, RepositoryError> {
        let row: Option<CosmeticRow> = sqlx::query_as(concat!(
            "SELECT ",
            cosmetic_columns!(),
            " FROM cosmetic WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogItem::try_from).transpose()
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let rows: Vec<CosmeticRow> = sqlx::query_as(concat!(
            "SELECT ",
            cosmetic_columns!(),
            " FROM cosmetic ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn upsert_cosmetic(&self, item: &CatalogItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cosmetic
                (id, name, description, item_type, rarity, price, season, version, chapter, availability)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                item_type = EXCLUDED.item_type,
                rarity = EXCLUDED.rarity,
                price = EXCLUDED.price,
                season = EXCLUDED.season,
                version = EXCLUDED.version,
                chapter = EXCLUDED.chapter,
                availability = EXCLUDED.availability,
                updated_at = NOW()
            ",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.description.as_deref())
        .bind(item.item_type)
        .bind(item.rarity)
        .bind(to_bigint(item.price, "price")?)
        .bind(&item.introduced.season)
        .bind(&item.introduced.version)
        .bind(item.introduced.chapter)
        .bind(item.availability)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_shop(&self) -> Result<Option<ShopSnapshot>, RepositoryError> {
        let row: Option<ShopRow> = sqlx::query_as(concat!(
            "SELECT ",
            shop_columns!(),
            " FROM shop_snapshot WHERE active"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShopSnapshot::from))
    }

    #[instrument(skip_all, fields(created_by = %new.created_by))]
    async fn replace_active_shop(
        &self,
        new: NewShopSnapshot,
    ) -> Result<ShopSnapshot, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE shop_snapshot SET active = FALSE WHERE active")
            .execute(&mut *tx)
            .await?;

        let row: ShopRow = sqlx::query_as(concat!(
            r"
            INSERT INTO shop_snapshot (featured, daily, special, season, version, created_by, active, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
            RETURNING ",
            shop_columns!()
        ))
        .bind(Json(&new.featured))
        .bind(Json(&new.daily))
        .bind(Json(&new.special))
        .bind(&new.season)
        .bind(&new.version)
        .bind(&new.created_by)
        .bind(new.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("active shop".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        tx.commit().await?;
        Ok(ShopSnapshot::from(row))
    }

    async fn shop_history(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ShopSnapshot>, RepositoryError> {
        let rows: Vec<ShopRow> = sqlx::query_as(concat!(
            "SELECT ",
            shop_columns!(),
            " FROM shop_snapshot ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ShopSnapshot::from).collect())
    }

    async fn economy_stats(&self) -> Result<EconomyStats, RepositoryError> {
        let stats: EconomyStats = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM account) AS total_accounts,
                (SELECT COUNT(*) FROM account WHERE banned_at IS NOT NULL) AS banned_accounts,
                (SELECT COUNT(*) FROM account WHERE is_admin) AS admins,
                (SELECT COUNT(*) FROM account WHERE is_elite_donor) AS elite_donors,
                (SELECT COUNT(*) FROM account WHERE has_full_locker) AS full_locker_holders,
                (SELECT COUNT(*) FROM account WHERE is_booster) AS boosters,
                (SELECT COUNT(*) FROM ledger_entry) AS total_entries,
                (SELECT COUNT(*) FROM ledger_entry WHERE kind = 'purchase') AS purchases,
                (SELECT COALESCE(SUM(-delta), 0)::BIGINT FROM ledger_entry
                    WHERE kind IN ('purchase', 'gift_sent') AND currency = 'vbucks') AS vbucks_spent,
                (SELECT COALESCE(SUM(balance), 0)::BIGINT FROM account) AS vbucks_in_circulation,
                (SELECT COUNT(*) FROM shop_snapshot WHERE active AND expires_at > NOW()) AS active_shops,
                (SELECT COUNT(*) FROM cosmetic) AS catalog_size
            ",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
