//! Reward claims.
//!
//! A claim is checked with [`can_claim`], then granted through the same
//! commit path as every other ledger mutation. The catalog-driven full-locker
//! reward can be thousands of items, so its grants are committed in batches.
//! Only the final batch credits currency and flips the claim flag: if a batch
//! fails, the items already committed stay granted, the flag stays unset, and
//! a retry grants only what is still missing.

use tracing::{info, instrument, warn};

use dub_core::{
    AvailableReward, ClaimFlags, ExternalId, ItemGrant, LedgerKind, NewLedgerEntry, RewardItem,
    RewardKind, RewardTable, available_rewards, can_claim, eligible_full_locker_items, signed,
};

use crate::db::Store;

use super::{EconomyError, LedgerService};

/// Items committed per storage write during a bulk grant.
pub const GRANT_BATCH_SIZE: usize = 100;

/// Result of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub kind: RewardKind,
    pub vbucks: u64,
    /// Items newly placed in the locker by this call.
    pub items_granted: usize,
    pub balance: u64,
}

/// Reward listing for one account.
#[derive(Debug, Clone)]
pub struct RewardStatus {
    pub available: Vec<AvailableReward>,
    pub claims: ClaimFlags,
}

pub struct RewardService<'a> {
    store: &'a dyn Store,
    table: &'a RewardTable,
}

impl<'a> RewardService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, table: &'a RewardTable) -> Self {
        Self { store, table }
    }

    /// Rewards the account may claim now, and its claim flags.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    pub async fn available(&self, id: &ExternalId) -> Result<RewardStatus, EconomyError> {
        let account = LedgerService::new(self.store).load(id).await?;
        Ok(RewardStatus {
            available: available_rewards(&account, self.table),
            claims: account.claims,
        })
    }

    /// Claim a reward once.
    ///
    /// # Errors
    ///
    /// Returns `Banned`, `AlreadyClaimed`, `RoleRequired`, `NotFound`,
    /// `ConcurrentModification` or `Storage`.
    #[instrument(skip(self))]
    pub async fn claim(
        &self,
        id: &ExternalId,
        kind: RewardKind,
    ) -> Result<ClaimOutcome, EconomyError> {
        let ledger = LedgerService::new(self.store);
        let mut account = ledger.load(id).await?;
        if let Some(ban) = &account.ban {
            return Err(EconomyError::Banned(ban.clone()));
        }
        can_claim(&account, kind)?;

        let (vbucks, grants): (u64, Vec<ItemGrant>) = match self.table.fixed(kind) {
            Some(fixed) => (fixed.vbucks, fixed.items.iter().map(RewardItem::grant).collect()),
            None => {
                let catalog = self.store.list_catalog().await?;
                let cutoff = self.table.full_locker_cutoff.as_str();
                (0, eligible_full_locker_items(&catalog, cutoff).collect())
            }
        };
        let pending: Vec<ItemGrant> = grants
            .into_iter()
            .filter(|grant| !account.owns(&grant.item.id))
            .collect();

        let batches: Vec<&[ItemGrant]> = pending.chunks(GRANT_BATCH_SIZE).collect();
        let total = batches.len().max(1);
        let mut granted = 0;

        for (index, batch) in batches.iter().enumerate() {
            let is_final = index + 1 == total;
            let mut count = 0;
            for grant in *batch {
                if account.grant(grant.clone()) {
                    count += 1;
                }
            }
            granted += count;
            if is_final {
                break;
            }
            let entry = NewLedgerEntry::new(
                id.clone(),
                LedgerKind::RewardClaim,
                0,
                format!("{kind} reward: {count} items (batch {}/{total})", index + 1),
            );
            account = ledger.commit_one(account, vec![entry]).await.inspect_err(|e| {
                warn!(error = %e, batch = index + 1, "Reward batch failed; claim left open");
            })?;
        }

        if vbucks > 0 {
            account.credit(vbucks)?;
        }
        kind.mark_claimed(&mut account.claims);
        let entry = NewLedgerEntry::new(
            id.clone(),
            LedgerKind::RewardClaim,
            signed(vbucks),
            format!("{kind} reward claimed: {vbucks} vbucks, {granted} items"),
        );
        let account = ledger.commit_one(account, vec![entry]).await?;

        info!(vbucks, items = granted, "Reward claimed");
        Ok(ClaimOutcome {
            kind,
            vbucks,
            items_granted: granted,
            balance: account.balance,
        })
    }
}
