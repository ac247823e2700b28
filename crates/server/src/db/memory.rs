//! In-memory store.
//!
//! Same contract as the `PostgreSQL` store: version-checked account writes,
//! all-or-nothing commits, cascade purge of ledger entries and a single
//! active shop snapshot. Used by tests and by `DUB_STORE=memory`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use dub_core::{
    Account, CatalogItem, CosmeticId, Currency, Email, ExternalId, LedgerEntry, LedgerEntryId,
    LedgerKind, NewLedgerEntry, NewShopSnapshot, ShopSnapshot, ShopSnapshotId,
};

use super::{AccountWrite, EconomyStats, RepositoryError, Store};

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<ExternalId, StoredAccount>,
    entries: Vec<LedgerEntry>,
    next_entry_id: i64,
    catalog: BTreeMap<CosmeticId, CatalogItem>,
    shops: Vec<ShopSnapshot>,
    next_shop_id: i64,
}

impl State {
    fn append(&mut self, entries: Vec<NewLedgerEntry>, now: DateTime<Utc>) {
        for entry in entries {
            self.next_entry_id += 1;
            self.entries.push(LedgerEntry::from_new(
                LedgerEntryId::new(self.next_entry_id),
                entry,
                now,
            ));
        }
    }
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    /// Remaining commits before injected failures start. `None` disables.
    commit_budget: RwLock<Option<usize>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `commits` more commits succeed, then fail every commit with
    /// `Unavailable`. `None` turns failure injection off.
    pub async fn fail_commits_after(&self, commits: Option<usize>) {
        *self.commit_budget.write().await = commits;
    }

    /// Every entry in the store, oldest first.
    pub async fn all_entries(&self) -> Vec<LedgerEntry> {
        self.state.read().await.entries.clone()
    }

    async fn take_commit_budget(&self) -> Result<(), RepositoryError> {
        let mut budget = self.commit_budget.write().await;
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(RepositoryError::Unavailable(
                    "injected commit failure".to_owned(),
                ));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

fn window<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.iter().skip(offset).take(limit).cloned().collect()
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_account(&self, id: &ExternalId) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.accounts.get(id).map(|stored| stored.account.clone()))
    }

    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|stored| &stored.account.email == email)
            .map(|stored| (stored.account.clone(), stored.password_hash.clone())))
    }

    async fn create_account(
        &self,
        account: &Account,
        password_hash: &str,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Account, RepositoryError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.external_id) {
            return Err(RepositoryError::Conflict("external id".to_owned()));
        }
        if state
            .accounts
            .values()
            .any(|stored| stored.account.email == account.email)
        {
            return Err(RepositoryError::Conflict("email".to_owned()));
        }

        let stored = Account {
            version: 0,
            ..account.clone()
        };
        state.accounts.insert(
            stored.external_id.clone(),
            StoredAccount {
                account: stored.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        state.append(entries, Utc::now());
        Ok(stored)
    }

    async fn record_login(
        &self,
        id: &ExternalId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.accounts.get_mut(id) {
            stored.account.last_login = Some(at);
        }
        Ok(())
    }

    async fn commit(
        &self,
        writes: Vec<AccountWrite>,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Vec<Account>, RepositoryError> {
        self.take_commit_budget().await?;
        let mut state = self.state.write().await;

        // Validate every write before touching anything.
        for write in &writes {
            let id = &write.account.external_id;
            let stored = state
                .accounts
                .get(id)
                .ok_or_else(|| RepositoryError::VersionConflict(id.clone()))?;
            if stored.account.version != write.expected_version() {
                return Err(RepositoryError::VersionConflict(id.clone()));
            }
        }

        let mut committed = Vec::with_capacity(writes.len());
        for write in writes {
            let version = write.expected_version() + 1;
            if let Some(stored) = state.accounts.get_mut(&write.account.external_id) {
                // Login timestamps are written out of band by `record_login`.
                let account = Account {
                    version,
                    last_login: stored.account.last_login,
                    ..write.account
                };
                stored.account = account.clone();
                committed.push(account);
            }
        }

        state.append(entries, Utc::now());
        Ok(committed)
    }

    async fn delete_account(&self, id: &ExternalId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if state.accounts.remove(id).is_none() {
            return Ok(false);
        }
        state.entries.retain(|entry| &entry.account != id);
        Ok(true)
    }

    async fn list_entries(
        &self,
        id: &ExternalId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|entry| &entry.account == id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(window(&entries, offset, limit))
    }

    async fn count_entries(&self, id: &ExternalId) -> Result<i64, RepositoryError> {
        let state = self.state.read().await;
        Ok(count(
            state
                .entries
                .iter()
                .filter(|entry| &entry.account == id)
                .count(),
        ))
    }

    async fn get_cosmetic(&self, id: &CosmeticId) -> Result<Option<CatalogItem>, RepositoryError> {
        Ok(self.state.read().await.catalog.get(id).cloned())
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        Ok(self.state.read().await.catalog.values().cloned().collect())
    }

    async fn upsert_cosmetic(&self, item: &CatalogItem) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .catalog
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn active_shop(&self) -> Result<Option<ShopSnapshot>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.shops.iter().find(|shop| shop.active).cloned())
    }

    async fn replace_active_shop(
        &self,
        new: NewShopSnapshot,
    ) -> Result<ShopSnapshot, RepositoryError> {
        let mut state = self.state.write().await;
        for shop in &mut state.shops {
            shop.active = false;
        }
        state.next_shop_id += 1;
        let snapshot = ShopSnapshot::from_new(ShopSnapshotId::new(state.next_shop_id), new, Utc::now());
        state.shops.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn shop_history(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ShopSnapshot>, RepositoryError> {
        let state = self.state.read().await;
        let newest_first: Vec<ShopSnapshot> = state.shops.iter().rev().cloned().collect();
        Ok(window(&newest_first, offset, limit))
    }

    async fn economy_stats(&self) -> Result<EconomyStats, RepositoryError> {
        let state = self.state.read().await;
        let now = Utc::now();
        let accounts = || state.accounts.values().map(|stored| &stored.account);

        let vbucks_spent: i64 = state
            .entries
            .iter()
            .filter(|entry| {
                matches!(entry.kind, LedgerKind::Purchase | LedgerKind::GiftSent)
                    && entry.currency == Currency::Vbucks
            })
            .map(|entry| -entry.delta)
            .sum();
        let circulation: u64 = accounts().map(|account| account.balance).sum();

        Ok(EconomyStats {
            total_accounts: count(state.accounts.len()),
            banned_accounts: count(accounts().filter(|a| a.is_banned()).count()),
            admins: count(accounts().filter(|a| a.roles.is_admin).count()),
            elite_donors: count(accounts().filter(|a| a.roles.is_elite_donor).count()),
            full_locker_holders: count(accounts().filter(|a| a.roles.has_full_locker).count()),
            boosters: count(accounts().filter(|a| a.roles.is_booster).count()),
            total_entries: count(state.entries.len()),
            purchases: count(
                state
                    .entries
                    .iter()
                    .filter(|entry| entry.kind == LedgerKind::Purchase)
                    .count(),
            ),
            vbucks_spent,
            vbucks_in_circulation: i64::try_from(circulation).unwrap_or(i64::MAX),
            active_shops: count(state.shops.iter().filter(|shop| shop.is_live(now)).count()),
            catalog_size: count(state.catalog.len()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dub_core::{ClaimFlags, LedgerKind, Locker, RoleFlags};

    use super::*;

    fn account(id: &str, email: &str) -> Account {
        Account {
            external_id: ExternalId::parse(id).unwrap(),
            username: "player".to_owned(),
            email: Email::parse(email).unwrap(),
            balance: 1000,
            locker: Locker::default(),
            roles: RoleFlags::default(),
            claims: ClaimFlags::default(),
            ban: None,
            created_at: Utc::now(),
            last_login: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicates() {
        let store = MemoryStore::new();
        let a = account("111111111111111111", "a@example.com");
        store.create_account(&a, "hash", Vec::new()).await.unwrap();

        let same_id = account("111111111111111111", "b@example.com");
        let err = store.create_account(&same_id, "hash", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "external id"));

        let same_email = account("222222222222222222", "a@example.com");
        let err = store.create_account(&same_email, "hash", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_version() {
        let store = MemoryStore::new();
        let a = account("111111111111111111", "a@example.com");
        let created = store.create_account(&a, "hash", Vec::new()).await.unwrap();

        let mut first = created.clone();
        first.balance = 500;
        let committed = store
            .commit(vec![AccountWrite::new(first)], Vec::new())
            .await
            .unwrap();
        assert_eq!(committed[0].version, 1);

        let mut stale = created;
        stale.balance = 0;
        let err = store
            .commit(vec![AccountWrite::new(stale)], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::VersionConflict(_)));

        let stored = store.get_account(&a.external_id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 500);
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let store = MemoryStore::new();
        let a = store
            .create_account(&account("111111111111111111", "a@example.com"), "h", Vec::new())
            .await
            .unwrap();
        let b = store
            .create_account(&account("222222222222222222", "b@example.com"), "h", Vec::new())
            .await
            .unwrap();

        let mut a_next = a.clone();
        a_next.balance = 1;
        let mut b_stale = b;
        b_stale.version = 7;
        let entry = NewLedgerEntry::new(a.external_id.clone(), LedgerKind::AdminGrant, -999, "x");

        let result = store
            .commit(
                vec![AccountWrite::new(a_next), AccountWrite::new(b_stale)],
                vec![entry],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(
            store.get_account(&a.external_id).await.unwrap().unwrap().balance,
            1000
        );
        assert!(store.all_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_purges_entries() {
        let store = MemoryStore::new();
        let a = account("111111111111111111", "a@example.com");
        let entry = NewLedgerEntry::new(a.external_id.clone(), LedgerKind::AdminGrant, 1000, "bonus");
        store.create_account(&a, "h", vec![entry]).await.unwrap();
        assert_eq!(store.count_entries(&a.external_id).await.unwrap(), 1);

        assert!(store.delete_account(&a.external_id).await.unwrap());
        assert_eq!(store.count_entries(&a.external_id).await.unwrap(), 0);
        assert!(!store.delete_account(&a.external_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_commit_failures() {
        let store = MemoryStore::new();
        let a = store
            .create_account(&account("111111111111111111", "a@example.com"), "h", Vec::new())
            .await
            .unwrap();
        store.fail_commits_after(Some(0)).await;
        let err = store
            .commit(vec![AccountWrite::new(a.clone())], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));

        store.fail_commits_after(None).await;
        assert!(store.commit(vec![AccountWrite::new(a)], Vec::new()).await.is_ok());
    }
}
