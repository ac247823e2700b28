//! Ledger service: every balance and locker mutation, each paired with its
//! audit entry in one storage commit.
//!
//! Operations load the account, apply the change in memory through the
//! `dub_core` account methods (which refuse anything that would break an
//! invariant), then hand the new state and its ledger entries to
//! [`Store::commit`]. If the account moved underneath us the commit fails
//! with [`EconomyError::ConcurrentModification`] and nothing is written.

use chrono::Utc;
use tracing::{info, instrument};

use dub_core::{
    Account, CatalogItem, Category, CosmeticId, ExternalId, ItemGrant, LedgerEntry, LedgerKind,
    NewLedgerEntry, PaymentDetails, StarterKit, signed,
};

use crate::db::{AccountWrite, RepositoryError, Store};

use super::EconomyError;

/// Why a mutation happened. Copied onto the ledger entry.
#[derive(Debug, Clone)]
pub struct Reason {
    pub kind: LedgerKind,
    pub description: String,
    pub counterparty: Option<ExternalId>,
}

impl Reason {
    #[must_use]
    pub fn new(kind: LedgerKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            counterparty: None,
        }
    }

    /// An administrative correction made by `admin`.
    #[must_use]
    pub fn admin(admin: &ExternalId, description: impl Into<String>) -> Self {
        Self::new(LedgerKind::AdminGrant, description).with_counterparty(admin.clone())
    }

    #[must_use]
    pub fn with_counterparty(mut self, counterparty: ExternalId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    fn entry(&self, account: &ExternalId, delta: i64) -> NewLedgerEntry {
        let entry = NewLedgerEntry::new(account.clone(), self.kind, delta, &self.description);
        match &self.counterparty {
            Some(counterparty) => entry.with_counterparty(counterparty.clone()),
            None => entry,
        }
    }
}

/// Result of [`LedgerService::grant_item`].
#[derive(Debug, Clone)]
pub enum GrantOutcome {
    Granted(Account),
    /// The item was already in the locker; nothing was written.
    AlreadyOwned,
}

/// A completed purchase.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub account: Account,
    pub item: CatalogItem,
    pub price: u64,
}

/// A completed gift.
#[derive(Debug, Clone)]
pub struct Gift {
    pub sender: Account,
    pub recipient: Account,
    pub item: CatalogItem,
    pub price: u64,
}

/// Largest page [`LedgerService::history`] returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of ledger history.
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

/// Balance and locker mutations.
pub struct LedgerService<'a> {
    store: &'a dyn Store,
}

impl<'a> LedgerService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Load an account or fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    pub async fn load(&self, id: &ExternalId) -> Result<Account, EconomyError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(EconomyError::NotFound("account"))
    }

    /// Load an account that is allowed to spend or claim.
    async fn load_active(&self, id: &ExternalId) -> Result<Account, EconomyError> {
        let account = self.load(id).await?;
        match &account.ban {
            Some(ban) => Err(EconomyError::Banned(ban.clone())),
            None => Ok(account),
        }
    }

    /// Write one account and its entries.
    pub(crate) async fn commit_one(
        &self,
        account: Account,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Account, EconomyError> {
        self.store
            .commit(vec![AccountWrite::new(account)], entries)
            .await?
            .into_iter()
            .next()
            .ok_or(EconomyError::Storage(RepositoryError::NotFound))
    }

    // =========================================================================
    // Account lifecycle
    // =========================================================================

    /// Create an account holding the starter kit, with one admin-grant entry
    /// for the vbucks and one for the item.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` naming the duplicate field (email or external
    /// id), or `Storage`.
    #[instrument(skip_all, fields(account = %account.external_id))]
    pub async fn open_account(
        &self,
        mut account: Account,
        password_hash: &str,
        starter: &StarterKit,
    ) -> Result<Account, EconomyError> {
        let id = account.external_id.clone();
        let mut entries = Vec::with_capacity(2);

        account.balance = starter.vbucks;
        if starter.vbucks > 0 {
            entries.push(NewLedgerEntry::new(
                id.clone(),
                LedgerKind::AdminGrant,
                signed(starter.vbucks),
                "Welcome bonus",
            ));
        }
        let grant = starter.item.grant();
        let item_ref = grant.item_ref();
        if account.grant(grant) {
            entries.push(
                NewLedgerEntry::new(id.clone(), LedgerKind::AdminGrant, 0, "Welcome bonus")
                    .with_item(item_ref),
            );
        }

        let account = self
            .store
            .create_account(&account, password_hash, entries)
            .await?;
        info!(balance = account.balance, "Account opened");
        Ok(account)
    }

    // =========================================================================
    // Balance
    // =========================================================================

    /// Add `amount` to the balance.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` for a zero amount, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self, reason), fields(kind = ?reason.kind))]
    pub async fn credit(
        &self,
        id: &ExternalId,
        amount: u64,
        reason: &Reason,
    ) -> Result<Account, EconomyError> {
        let mut account = self.load(id).await?;
        account.credit(amount)?;
        let entry = reason.entry(id, signed(amount));
        let account = self.commit_one(account, vec![entry]).await?;
        info!(balance = account.balance, "Credited");
        Ok(account)
    }

    /// Subtract `amount` from the balance.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` if `amount` exceeds the balance (nothing is
    /// written), `ValidationFailed` for a zero amount, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self, reason), fields(kind = ?reason.kind))]
    pub async fn debit(
        &self,
        id: &ExternalId,
        amount: u64,
        reason: &Reason,
    ) -> Result<Account, EconomyError> {
        let mut account = self.load(id).await?;
        account.debit(amount)?;
        let entry = reason.entry(id, -signed(amount));
        let account = self.commit_one(account, vec![entry]).await?;
        info!(balance = account.balance, "Debited");
        Ok(account)
    }

    /// Overwrite the balance. The entry records `old -> new` and carries the
    /// difference as its delta.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `ConcurrentModification` or `Storage`.
    #[instrument(skip(self, reason), fields(kind = ?reason.kind))]
    pub async fn set_balance(
        &self,
        id: &ExternalId,
        amount: u64,
        reason: &Reason,
    ) -> Result<Account, EconomyError> {
        let mut account = self.load(id).await?;
        let previous = account.set_balance(amount);
        let mut entry = reason.entry(id, signed(amount).saturating_sub(signed(previous)));
        entry.description = format!("{} ({previous} -> {amount})", reason.description);
        let account = self.commit_one(account, vec![entry]).await?;
        info!(previous, balance = account.balance, "Balance set");
        Ok(account)
    }

    // =========================================================================
    // Locker
    // =========================================================================

    /// Put an item into the locker. Owning it already (in any category) is
    /// not an error: the call reports [`GrantOutcome::AlreadyOwned`] and
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `ConcurrentModification` or `Storage`.
    #[instrument(skip(self, grant, reason), fields(item = %grant.item.id))]
    pub async fn grant_item(
        &self,
        id: &ExternalId,
        grant: ItemGrant,
        reason: &Reason,
    ) -> Result<GrantOutcome, EconomyError> {
        let mut account = self.load(id).await?;
        let entry = reason.entry(id, 0).with_item(grant.item_ref());
        if !account.grant(grant) {
            return Ok(GrantOutcome::AlreadyOwned);
        }
        let account = self.commit_one(account, vec![entry]).await?;
        info!("Item granted");
        Ok(GrantOutcome::Granted(account))
    }

    /// Take an item out of `category`. Admin corrective action; no ledger
    /// entry is written.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotOwned` if the item is not in that category, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self))]
    pub async fn revoke_item(
        &self,
        id: &ExternalId,
        item_id: &CosmeticId,
        category: Category,
    ) -> Result<Account, EconomyError> {
        let mut account = self.load(id).await?;
        if account.locker.remove(category, item_id).is_none() {
            return Err(EconomyError::ItemNotOwned(item_id.clone()));
        }
        let account = self.commit_one(account, Vec::new()).await?;
        info!("Item revoked");
        Ok(account)
    }

    // =========================================================================
    // Shop
    // =========================================================================

    /// Resolve a shop offer: the catalog item, its grant under `category`,
    /// and a check that the live snapshot lists it.
    async fn offer(
        &self,
        item_id: &CosmeticId,
        category: Category,
    ) -> Result<(CatalogItem, ItemGrant), EconomyError> {
        let item = self
            .store
            .get_cosmetic(item_id)
            .await?
            .ok_or(EconomyError::NotFound("item"))?;
        let grant = item.grant_as(category).ok_or_else(|| {
            EconomyError::ValidationFailed(format!(
                "item {item_id} is a {} and cannot be placed in {}",
                item.item_type,
                category.plural()
            ))
        })?;

        let shop = self
            .store
            .active_shop()
            .await?
            .filter(|shop| shop.is_live(Utc::now()))
            .ok_or(EconomyError::NotFound("shop"))?;
        if !shop.contains(item_id) {
            return Err(EconomyError::ItemNotInShop(item_id.clone()));
        }

        Ok((item, grant))
    }

    /// Buy an item from the live shop at its catalog price.
    ///
    /// # Errors
    ///
    /// Returns `Banned`, `NotFound` (account, item or live shop),
    /// `ValidationFailed` (category mismatch), `ItemNotInShop`,
    /// `AlreadyOwned`, `InsufficientFunds`, `ConcurrentModification` or
    /// `Storage`. Nothing is written on error.
    #[instrument(skip(self))]
    pub async fn purchase(
        &self,
        id: &ExternalId,
        item_id: &CosmeticId,
        category: Category,
    ) -> Result<Purchase, EconomyError> {
        let mut account = self.load_active(id).await?;
        let (item, grant) = self.offer(item_id, category).await?;
        if account.owns(item_id) {
            return Err(EconomyError::AlreadyOwned(item_id.clone()));
        }

        let price = item.price;
        if price > 0 {
            account.debit(price)?;
        }
        account.grant(grant);

        let entry = NewLedgerEntry::new(
            id.clone(),
            LedgerKind::Purchase,
            -signed(price),
            format!("Purchased {}", item.name),
        )
        .with_item(item.item_ref());
        let account = self.commit_one(account, vec![entry]).await?;

        info!(price, balance = account.balance, "Purchase completed");
        Ok(Purchase {
            account,
            item,
            price,
        })
    }

    /// Buy an item from the live shop for someone else.
    ///
    /// Sender debit, recipient grant and both entries are one commit.
    ///
    /// # Errors
    ///
    /// Returns `SelfGift` before anything is loaded, then the same errors as
    /// [`Self::purchase`], with `AlreadyOwned` referring to the recipient.
    #[instrument(skip(self))]
    pub async fn gift(
        &self,
        sender_id: &ExternalId,
        recipient_id: &ExternalId,
        item_id: &CosmeticId,
        category: Category,
    ) -> Result<Gift, EconomyError> {
        if sender_id == recipient_id {
            return Err(EconomyError::SelfGift);
        }

        let mut sender = self.load_active(sender_id).await?;
        let mut recipient = self.load(recipient_id).await?;
        let (item, grant) = self.offer(item_id, category).await?;
        if recipient.owns(item_id) {
            return Err(EconomyError::AlreadyOwned(item_id.clone()));
        }

        let price = item.price;
        if price > 0 {
            sender.debit(price)?;
        }
        recipient.grant(grant);

        let entries = vec![
            NewLedgerEntry::new(
                sender_id.clone(),
                LedgerKind::GiftSent,
                -signed(price),
                format!("Gifted {} to {}", item.name, recipient.username),
            )
            .with_item(item.item_ref())
            .with_counterparty(recipient_id.clone()),
            NewLedgerEntry::new(
                recipient_id.clone(),
                LedgerKind::GiftReceived,
                0,
                format!("Received {} from {}", item.name, sender.username),
            )
            .with_item(item.item_ref())
            .with_counterparty(sender_id.clone()),
        ];

        let mut committed = self
            .store
            .commit(
                vec![AccountWrite::new(sender), AccountWrite::new(recipient)],
                entries,
            )
            .await?
            .into_iter();
        let (Some(sender), Some(recipient)) = (committed.next(), committed.next()) else {
            return Err(EconomyError::Storage(RepositoryError::NotFound));
        };

        info!(price, "Gift completed");
        Ok(Gift {
            sender,
            recipient,
            item,
            price,
        })
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Record a confirmed external payment. The balance is not touched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    #[instrument(skip(self, payment), fields(method = %payment.method, reference = %payment.reference))]
    pub async fn record_payment(
        &self,
        id: &ExternalId,
        payment: PaymentDetails,
        description: &str,
    ) -> Result<(), EconomyError> {
        self.load(id).await?;
        let entry =
            NewLedgerEntry::new(id.clone(), LedgerKind::Payment, 0, description).with_payment(payment);
        self.store.commit(Vec::new(), vec![entry]).await?;
        info!("Payment recorded");
        Ok(())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// One page of an account's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` for a page below 1 or a limit outside 1 to
    /// 100, `NotFound` or `Storage`.
    pub async fn history(
        &self,
        id: &ExternalId,
        page: u32,
        limit: u32,
    ) -> Result<LedgerPage, EconomyError> {
        if page == 0 {
            return Err(EconomyError::ValidationFailed("page must be at least 1".to_owned()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(EconomyError::ValidationFailed(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        self.load(id).await?;
        let limit = i64::from(limit);
        let offset = i64::from(page - 1) * limit;
        let entries = self.store.list_entries(id, offset, limit).await?;
        let total = self.store.count_entries(id).await?;
        Ok(LedgerPage {
            entries,
            total,
            page,
            pages: (total + limit - 1) / limit,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use dub_core::{BanState, ItemType, PaymentMethod, PaymentStatus};

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::fixtures::{
        PLAYER_A, PLAYER_B, catalog_item, id, open, rotate_with, seed_catalog,
    };

    async fn entries(store: &MemoryStore, account: &str) -> Vec<LedgerEntry> {
        let account = id(account);
        store
            .all_entries()
            .await
            .into_iter()
            .filter(|entry| entry.account == account)
            .collect()
    }

    #[tokio::test]
    async fn test_open_account_grants_starter_kit() {
        let store = MemoryStore::new();
        let account = open(&store, PLAYER_A).await;

        assert_eq!(account.balance, 1000);
        assert_eq!(account.locker.counts().total, 1);
        let written = entries(&store, PLAYER_A).await;
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|e| e.kind == LedgerKind::AdminGrant));
        assert_eq!(written.iter().map(|e| e.delta).sum::<i64>(), 1000);
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let reason = Reason::new(LedgerKind::AdminGrant, "test");

        let account = ledger.credit(&id(PLAYER_A), 500, &reason).await.unwrap();
        assert_eq!(account.balance, 1500);
        let account = ledger.debit(&id(PLAYER_A), 1500, &reason).await.unwrap();
        assert_eq!(account.balance, 0);

        let written = entries(&store, PLAYER_A).await;
        let deltas: Vec<i64> = written.iter().skip(2).map(|e| e.delta).collect();
        assert_eq!(deltas, vec![500, -1500]);
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_changes_nothing() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let reason = Reason::new(LedgerKind::AdminGrant, "test");

        let err = ledger.debit(&id(PLAYER_A), 1001, &reason).await.unwrap_err();
        assert!(matches!(
            err,
            EconomyError::InsufficientFunds {
                balance: 1000,
                required: 1001
            }
        ));
        assert_eq!(ledger.load(&id(PLAYER_A)).await.unwrap().balance, 1000);
        assert_eq!(entries(&store, PLAYER_A).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_debits_cannot_overdraw() {
        let store = Arc::new(MemoryStore::new());
        open(store.as_ref(), PLAYER_A).await;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    LedgerService::new(store.as_ref())
                        .debit(&id(PLAYER_A), 700, &Reason::new(LedgerKind::AdminGrant, "x"))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(
                    EconomyError::InsufficientFunds { .. } | EconomyError::ConcurrentModification,
                ) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 1);
        let account = LedgerService::new(store.as_ref())
            .load(&id(PLAYER_A))
            .await
            .unwrap();
        assert_eq!(account.balance, 300);
        assert_eq!(entries(&store, PLAYER_A).await.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_amount_is_rejected() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let reason = Reason::new(LedgerKind::AdminGrant, "test");

        let err = ledger.credit(&id(PLAYER_A), 0, &reason).await.unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_set_balance_records_old_and_new() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let admin = id(PLAYER_B);

        let account = ledger
            .set_balance(&id(PLAYER_A), 250, &Reason::admin(&admin, "Correction"))
            .await
            .unwrap();
        assert_eq!(account.balance, 250);

        let last = entries(&store, PLAYER_A).await.pop().unwrap();
        assert_eq!(last.delta, -750);
        assert_eq!(last.description, "Correction (1000 -> 250)");
        assert_eq!(last.counterparty, Some(admin));
    }

    #[tokio::test]
    async fn test_grant_item_is_idempotent() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let grant = catalog_item("Glider_ID_001", ItemType::Glider, 500)
            .grant()
            .unwrap();
        let reason = Reason::new(LedgerKind::AdminGrant, "gift");

        let first = ledger
            .grant_item(&id(PLAYER_A), grant.clone(), &reason)
            .await
            .unwrap();
        assert!(matches!(first, GrantOutcome::Granted(_)));
        let second = ledger
            .grant_item(&id(PLAYER_A), grant, &reason)
            .await
            .unwrap();
        assert!(matches!(second, GrantOutcome::AlreadyOwned));

        let account = ledger.load(&id(PLAYER_A)).await.unwrap();
        assert_eq!(account.locker.counts().gliders, 1);
        assert_eq!(entries(&store, PLAYER_A).await.len(), 3);
    }

    #[tokio::test]
    async fn test_revoke_item_requires_ownership() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let item = CosmeticId::parse("Glider_ID_001").unwrap();

        let err = ledger
            .revoke_item(&id(PLAYER_A), &item, Category::Glider)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::ItemNotOwned(_)));

        let grant = catalog_item("Glider_ID_001", ItemType::Glider, 500)
            .grant()
            .unwrap();
        ledger
            .grant_item(&id(PLAYER_A), grant, &Reason::new(LedgerKind::AdminGrant, "x"))
            .await
            .unwrap();
        let account = ledger
            .revoke_item(&id(PLAYER_A), &item, Category::Glider)
            .await
            .unwrap();
        assert!(!account.owns(&item));
    }

    #[tokio::test]
    async fn test_purchase_debits_catalog_price() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 800)]).await;
        rotate_with(&store, &["CID_100"]).await;
        let ledger = LedgerService::new(&store);

        let item = CosmeticId::parse("CID_100").unwrap();
        let purchase = ledger
            .purchase(&id(PLAYER_A), &item, Category::Outfit)
            .await
            .unwrap();
        assert_eq!(purchase.price, 800);
        assert_eq!(purchase.account.balance, 200);
        assert!(purchase.account.owns(&item));

        let last = entries(&store, PLAYER_A).await.pop().unwrap();
        assert_eq!(last.kind, LedgerKind::Purchase);
        assert_eq!(last.delta, -800);
        assert_eq!(last.item.unwrap().id, item);
    }

    #[tokio::test]
    async fn test_purchase_failures_leave_account_untouched() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        seed_catalog(
            &store,
            &[
                ("CID_100", ItemType::Outfit, 1500),
                ("CID_200", ItemType::Outfit, 100),
                ("Pickaxe_1", ItemType::Pickaxe, 100),
            ],
        )
        .await;
        rotate_with(&store, &["CID_100", "Pickaxe_1"]).await;
        let ledger = LedgerService::new(&store);
        let a = id(PLAYER_A);

        let err = ledger
            .purchase(&a, &CosmeticId::parse("CID_100").unwrap(), Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));

        let err = ledger
            .purchase(&a, &CosmeticId::parse("CID_200").unwrap(), Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::ItemNotInShop(_)));

        let err = ledger
            .purchase(&a, &CosmeticId::parse("Pickaxe_1").unwrap(), Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::ValidationFailed(_)));

        let err = ledger
            .purchase(&a, &CosmeticId::parse("CID_999").unwrap(), Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::NotFound("item")));

        let account = ledger.load(&a).await.unwrap();
        assert_eq!(account.balance, 1000);
        assert_eq!(account.locker.counts().total, 1);
        assert_eq!(entries(&store, PLAYER_A).await.len(), 2);
    }

    #[tokio::test]
    async fn test_purchase_already_owned() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 100)]).await;
        rotate_with(&store, &["CID_100"]).await;
        let ledger = LedgerService::new(&store);
        let item = CosmeticId::parse("CID_100").unwrap();

        ledger
            .purchase(&id(PLAYER_A), &item, Category::Outfit)
            .await
            .unwrap();
        let err = ledger
            .purchase(&id(PLAYER_A), &item, Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::AlreadyOwned(_)));
        assert_eq!(ledger.load(&id(PLAYER_A)).await.unwrap().balance, 900);
    }

    #[tokio::test]
    async fn test_purchase_without_live_shop() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 100)]).await;
        let ledger = LedgerService::new(&store);

        let err = ledger
            .purchase(
                &id(PLAYER_A),
                &CosmeticId::parse("CID_100").unwrap(),
                Category::Outfit,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::NotFound("shop")));
    }

    #[tokio::test]
    async fn test_banned_account_cannot_purchase() {
        let store = MemoryStore::new();
        let mut account = open(&store, PLAYER_A).await;
        account.ban = Some(BanState {
            reason: "cheating".to_owned(),
            banned_by: "admin".to_owned(),
            banned_at: Utc::now(),
        });
        let ledger = LedgerService::new(&store);
        ledger.commit_one(account, Vec::new()).await.unwrap();

        let err = ledger
            .purchase(
                &id(PLAYER_A),
                &CosmeticId::parse("CID_100").unwrap(),
                Category::Outfit,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::Banned(ref ban) if ban.reason == "cheating"));
    }

    #[tokio::test]
    async fn test_gift_moves_item_and_funds() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        open(&store, PLAYER_B).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 600)]).await;
        rotate_with(&store, &["CID_100"]).await;
        let ledger = LedgerService::new(&store);
        let item = CosmeticId::parse("CID_100").unwrap();

        let gift = ledger
            .gift(&id(PLAYER_A), &id(PLAYER_B), &item, Category::Outfit)
            .await
            .unwrap();
        assert_eq!(gift.sender.balance, 400);
        assert!(!gift.sender.owns(&item));
        assert_eq!(gift.recipient.balance, 1000);
        assert!(gift.recipient.owns(&item));

        let sent = entries(&store, PLAYER_A).await.pop().unwrap();
        let received = entries(&store, PLAYER_B).await.pop().unwrap();
        assert_eq!(sent.kind, LedgerKind::GiftSent);
        assert_eq!(sent.delta, -600);
        assert_eq!(sent.counterparty, Some(id(PLAYER_B)));
        assert_eq!(received.kind, LedgerKind::GiftReceived);
        assert_eq!(received.delta, 0);
        assert_eq!(received.counterparty, Some(id(PLAYER_A)));
    }

    #[tokio::test]
    async fn test_gift_to_self_is_rejected_first() {
        let store = MemoryStore::new();
        let ledger = LedgerService::new(&store);

        let err = ledger
            .gift(
                &id(PLAYER_A),
                &id(PLAYER_A),
                &CosmeticId::parse("CID_100").unwrap(),
                Category::Outfit,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::SelfGift));
    }

    #[tokio::test]
    async fn test_unaffordable_gift_changes_nothing() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        open(&store, PLAYER_B).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 5000)]).await;
        rotate_with(&store, &["CID_100"]).await;
        let ledger = LedgerService::new(&store);
        let item = CosmeticId::parse("CID_100").unwrap();

        let err = ledger
            .gift(&id(PLAYER_A), &id(PLAYER_B), &item, Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));

        let a = ledger.load(&id(PLAYER_A)).await.unwrap();
        let b = ledger.load(&id(PLAYER_B)).await.unwrap();
        assert_eq!((a.balance, b.balance), (1000, 1000));
        assert!(!b.owns(&item));
        assert_eq!(store.all_entries().await.len(), 4);
    }

    #[tokio::test]
    async fn test_gift_recipient_already_owns() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        open(&store, PLAYER_B).await;
        seed_catalog(&store, &[("CID_100", ItemType::Outfit, 100)]).await;
        rotate_with(&store, &["CID_100"]).await;
        let ledger = LedgerService::new(&store);
        let item = CosmeticId::parse("CID_100").unwrap();

        ledger
            .purchase(&id(PLAYER_B), &item, Category::Outfit)
            .await
            .unwrap();
        let err = ledger
            .gift(&id(PLAYER_A), &id(PLAYER_B), &item, Category::Outfit)
            .await
            .unwrap_err();
        assert!(matches!(err, EconomyError::AlreadyOwned(_)));
        assert_eq!(ledger.load(&id(PLAYER_A)).await.unwrap().balance, 1000);
    }

    #[tokio::test]
    async fn test_stale_account_is_a_concurrent_modification() {
        let store = MemoryStore::new();
        let stale = open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        ledger
            .credit(&id(PLAYER_A), 10, &Reason::new(LedgerKind::AdminGrant, "x"))
            .await
            .unwrap();

        let err = ledger.commit_one(stale, Vec::new()).await.unwrap_err();
        assert!(matches!(err, EconomyError::ConcurrentModification));
    }

    #[tokio::test]
    async fn test_record_payment_leaves_balance() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let payment = PaymentDetails {
            method: PaymentMethod::Paypal,
            reference: "PAY-1".to_owned(),
            status: PaymentStatus::Completed,
            paid_cents: 999,
            payer_email: None,
        };

        ledger
            .record_payment(&id(PLAYER_A), payment, "Elite donor purchase")
            .await
            .unwrap();
        assert_eq!(ledger.load(&id(PLAYER_A)).await.unwrap().balance, 1000);
        let last = entries(&store, PLAYER_A).await.pop().unwrap();
        assert_eq!(last.kind, LedgerKind::Payment);
        assert_eq!(last.delta, 0);
        assert!(last.payment.is_some());
    }

    #[tokio::test]
    async fn test_history_pages_newest_first() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);
        let reason = Reason::new(LedgerKind::RewardClaim, "Top up");
        ledger.credit(&id(PLAYER_A), 50, &reason).await.unwrap();

        let first = ledger.history(&id(PLAYER_A), 1, 2).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.pages, 2);
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.entries.first().unwrap().description, "Top up");

        let second = ledger.history(&id(PLAYER_A), 2, 2).await.unwrap();
        assert_eq!(second.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_paging() {
        let store = MemoryStore::new();
        open(&store, PLAYER_A).await;
        let ledger = LedgerService::new(&store);

        for (page, limit) in [(0, 10), (1, 0), (1, 101)] {
            let err = ledger.history(&id(PLAYER_A), page, limit).await.unwrap_err();
            assert!(matches!(err, EconomyError::ValidationFailed(_)));
        }
    }
}
