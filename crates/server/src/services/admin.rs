//! Administrative corrections and account management.
//!
//! Callers are responsible for checking that the acting account is an admin;
//! the HTTP layer does so with its `RequireAdmin` extractor and the CLI runs
//! with operator access.

use chrono::Utc;
use tracing::{info, instrument};

use dub_core::{Account, BanState, Category, CosmeticId, ExternalId, LedgerEntry};

use crate::db::{EconomyStats, Store};

use super::{EconomyError, GrantOutcome, LedgerService, Reason};

/// Ban reason length bounds, in characters.
const BAN_REASON_LENGTH: std::ops::RangeInclusive<usize> = 3..=500;
/// Upper bound for a single admin vbucks grant or balance override.
pub const MAX_ADMIN_VBUCKS: u64 = 1_000_000;
/// Ledger entries shown with an account.
const RECENT_ENTRIES: i64 = 10;

/// An account with its most recent ledger entries.
#[derive(Debug, Clone)]
pub struct AccountView {
    pub account: Account,
    pub recent: Vec<LedgerEntry>,
    pub entry_count: i64,
}

/// Role changes synced from the role provider. `None` leaves a flag as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleUpdate {
    pub elite_donor: Option<bool>,
    pub full_locker: Option<bool>,
    pub booster: Option<bool>,
}

pub struct AdminService<'a> {
    store: &'a dyn Store,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    const fn ledger(&self) -> LedgerService<'a> {
        LedgerService::new(self.store)
    }

    /// Ban an account.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` for a reason outside 3 to 500 characters or
    /// an account that is already banned, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self, admin), fields(admin = %admin.external_id))]
    pub async fn ban(
        &self,
        target: &ExternalId,
        reason: &str,
        admin: &Account,
    ) -> Result<Account, EconomyError> {
        let reason = reason.trim();
        if !BAN_REASON_LENGTH.contains(&reason.chars().count()) {
            return Err(EconomyError::ValidationFailed(format!(
                "ban reason must be {} to {} characters",
                BAN_REASON_LENGTH.start(),
                BAN_REASON_LENGTH.end()
            )));
        }

        let mut account = self.ledger().load(target).await?;
        if account.is_banned() {
            return Err(EconomyError::ValidationFailed(
                "account is already banned".to_owned(),
            ));
        }
        account.ban = Some(BanState {
            reason: reason.to_owned(),
            banned_by: admin.username.clone(),
            banned_at: Utc::now(),
        });

        let account = self.ledger().commit_one(account, Vec::new()).await?;
        info!("Account banned");
        Ok(account)
    }

    /// Lift a ban.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if the account is not banned, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self))]
    pub async fn unban(&self, target: &ExternalId) -> Result<Account, EconomyError> {
        let mut account = self.ledger().load(target).await?;
        if account.ban.take().is_none() {
            return Err(EconomyError::ValidationFailed(
                "account is not banned".to_owned(),
            ));
        }

        let account = self.ledger().commit_one(account, Vec::new()).await?;
        info!("Account unbanned");
        Ok(account)
    }

    /// Credit vbucks as an admin grant.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` outside 1 to 1,000,000, then the errors of
    /// [`LedgerService::credit`].
    pub async fn give_vbucks(
        &self,
        target: &ExternalId,
        amount: u64,
        admin: &Account,
    ) -> Result<Account, EconomyError> {
        if amount == 0 || amount > MAX_ADMIN_VBUCKS {
            return Err(EconomyError::ValidationFailed(format!(
                "amount must be between 1 and {MAX_ADMIN_VBUCKS}"
            )));
        }
        let reason = Reason::admin(
            &admin.external_id,
            format!("Admin grant by {}", admin.username),
        );
        self.ledger().credit(target, amount, &reason).await
    }

    /// Overwrite the balance.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` above 1,000,000, then the errors of
    /// [`LedgerService::set_balance`].
    pub async fn set_vbucks(
        &self,
        target: &ExternalId,
        amount: u64,
        admin: &Account,
    ) -> Result<Account, EconomyError> {
        if amount > MAX_ADMIN_VBUCKS {
            return Err(EconomyError::ValidationFailed(format!(
                "amount must be between 0 and {MAX_ADMIN_VBUCKS}"
            )));
        }
        let reason = Reason::admin(
            &admin.external_id,
            format!("Balance set by {}", admin.username),
        );
        self.ledger().set_balance(target, amount, &reason).await
    }

    /// Grant a catalog item under its own category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown item or account, `ValidationFailed`
    /// for a bundle, `AlreadyOwned`, `ConcurrentModification` or `Storage`.
    pub async fn give_item(
        &self,
        target: &ExternalId,
        item_id: &CosmeticId,
        admin: &Account,
    ) -> Result<Account, EconomyError> {
        let item = self
            .store
            .get_cosmetic(item_id)
            .await?
            .ok_or(EconomyError::NotFound("item"))?;
        let grant = item.grant().ok_or_else(|| {
            EconomyError::ValidationFailed(format!("{} items cannot be granted", item.item_type))
        })?;
        let reason = Reason::admin(
            &admin.external_id,
            format!("{} granted by {}", item.name, admin.username),
        );

        match self.ledger().grant_item(target, grant, &reason).await? {
            GrantOutcome::Granted(account) => Ok(account),
            GrantOutcome::AlreadyOwned => Err(EconomyError::AlreadyOwned(item_id.clone())),
        }
    }

    /// Remove an item from a locker category.
    ///
    /// # Errors
    ///
    /// Same as [`LedgerService::revoke_item`].
    pub async fn remove_item(
        &self,
        target: &ExternalId,
        item_id: &CosmeticId,
        category: Category,
    ) -> Result<Account, EconomyError> {
        self.ledger().revoke_item(target, item_id, category).await
    }

    /// An account with its ten most recent ledger entries.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    pub async fn view(&self, target: &ExternalId) -> Result<AccountView, EconomyError> {
        let account = self.ledger().load(target).await?;
        let recent = self.store.list_entries(target, 0, RECENT_ENTRIES).await?;
        let entry_count = self.store.count_entries(target).await?;
        Ok(AccountView {
            account,
            recent,
            entry_count,
        })
    }

    /// Delete an account and its ledger history.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    #[instrument(skip(self))]
    pub async fn delete(&self, target: &ExternalId) -> Result<(), EconomyError> {
        if !self.store.delete_account(target).await? {
            return Err(EconomyError::NotFound("account"));
        }
        info!("Account deleted");
        Ok(())
    }

    /// Economy-wide counters.
    ///
    /// # Errors
    ///
    /// Returns `Storage`.
    pub async fn stats(&self) -> Result<EconomyStats, EconomyError> {
        Ok(self.store.economy_stats().await?)
    }

    /// Grant or revoke admin rights.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `ConcurrentModification` or `Storage`.
    #[instrument(skip(self))]
    pub async fn set_admin(&self, target: &ExternalId, is_admin: bool) -> Result<Account, EconomyError> {
        let mut account = self.ledger().load(target).await?;
        account.roles.is_admin = is_admin;
        let account = self.ledger().commit_one(account, Vec::new()).await?;
        info!(is_admin, "Admin flag updated");
        Ok(account)
    }

    /// Apply role flags synced from the role provider.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `ConcurrentModification` or `Storage`.
    #[instrument(skip(self))]
    pub async fn set_roles(&self, target: &ExternalId, update: RoleUpdate) -> Result<Account, EconomyError> {
        let mut account = self.ledger().load(target).await?;
        let roles = &mut account.roles;
        if let Some(flag) = update.elite_donor {
            roles.is_elite_donor = flag;
        }
        if let Some(flag) = update.full_locker {
            roles.has_full_locker = flag;
        }
        if let Some(flag) = update.booster {
            roles.is_booster = flag;
        }
        let account = self.ledger().commit_one(account, Vec::new()).await?;
        info!(roles = ?account.roles, "Roles updated");
        Ok(account)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dub_core::{ItemType, LedgerKind};

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::fixtures::{PLAYER_A, PLAYER_B, id, open, seed_catalog};

    #[tokio::test]
    async fn test_ban_and_unban() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let admin = open(&store, PLAYER_B).await;
        let service = AdminService::new(&store);

        let err = service.ban(&id(PLAYER_A), "no", &admin).await.unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));

        let banned = service
            .ban(&id(PLAYER_A), "  chargeback fraud ", &admin)
            .await
            .unwrap();
        let ban = banned.ban.unwrap();
        assert_eq!(ban.reason, "chargeback fraud");
        assert_eq!(ban.banned_by, admin.username);

        let err = service.ban(&id(PLAYER_A), "again!", &admin).await.unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));

        let unbanned = service.unban(&id(PLAYER_A)).await.unwrap();
        assert!(!unbanned.is_banned());
        let err = service.unban(&id(PLAYER_A)).await.unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_vbucks_bounds() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let admin = open(&store, PLAYER_B).await;
        let service = AdminService::new(&store);

        assert!(service.give_vbucks(&id(PLAYER_A), 0, &admin).await.is_err());
        assert!(
            service
                .give_vbucks(&id(PLAYER_A), MAX_ADMIN_VBUCKS + 1, &admin)
                .await
                .is_err()
        );
        let account = service
            .give_vbucks(&id(PLAYER_A), 250, &admin)
            .await
            .unwrap();
        assert_eq!(account.balance, 1250);

        let account = service.set_vbucks(&id(PLAYER_A), 0, &admin).await.unwrap();
        assert_eq!(account.balance, 0);
        assert!(
            service
                .set_vbucks(&id(PLAYER_A), MAX_ADMIN_VBUCKS + 1, &admin)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_give_and_remove_item() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let admin = open(&store, PLAYER_B).await;
        seed_catalog(
            &store,
            &[
                ("EID_Floss", ItemType::Emote, 500),
                ("Bundle_1", ItemType::Bundle, 2000),
            ],
        )
        .await;
        let service = AdminService::new(&store);
        let floss = CosmeticId::parse("EID_Floss").unwrap();

        let account = service.give_item(&id(PLAYER_A), &floss, &admin).await.unwrap();
        assert_eq!(account.locker.counts().emotes, 1);
        let err = service
            .give_item(&id(PLAYER_A), &floss, &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::AlreadyOwned(_)));

        let err = service
            .give_item(&id(PLAYER_A), &CosmeticId::parse("Bundle_1").unwrap(), &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));

        let err = service
            .remove_item(&id(PLAYER_A), &floss, Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::ItemNotOwned(_)));
        let account = service
            .remove_item(&id(PLAYER_A), &floss, Category::Emote)
            .await
            .unwrap();
        assert!(!account.owns(&floss));
    }

    #[tokio::test]
    async fn test_view_and_delete() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let admin = open(&store, PLAYER_B).await;
        let service = AdminService::new(&store);
        for _ in 0..12 {
            service.give_vbucks(&id(PLAYER_A), 1, &admin).await.unwrap();
        }

        let view = service.view(&id(PLAYER_A)).await.unwrap();
        assert_eq!(view.recent.len(), 10);
        assert_eq!(view.entry_count, 14);
        assert!(view.recent.iter().all(|e| e.kind == LedgerKind::AdminGrant));
        assert_eq!(view.recent[0].counterparty, Some(admin.external_id.clone()));

        service.delete(&id(PLAYER_A)).await.unwrap();
        assert!(matches!(
            service.view(&id(PLAYER_A)).await,
            Err(EconomyError::NotFound("account"))
        ));
        assert!(matches!(
            service.delete(&id(PLAYER_A)).await,
            Err(EconomyError::NotFound("account"))
        ));
    }

    #[tokio::test]
    async fn test_role_sync() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let service = AdminService::new(&store);

        let account = service
            .set_roles(
                &id(PLAYER_A),
                RoleUpdate {
                    booster: Some(true),
                    ..RoleUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(account.roles.is_booster);
        assert!(!account.roles.is_elite_donor);

        let account = service.set_admin(&id(PLAYER_A), true).await.unwrap();
        assert!(account.roles.is_admin);
        assert!(account.roles.is_booster);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        open(&store, PLAYER_B).await;

        let stats = AdminService::new(&store).stats().await.unwrap();
        assert_eq!(stats.total_accounts, 2);
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.vbucks_in_circulation, 2000);
    }
}
