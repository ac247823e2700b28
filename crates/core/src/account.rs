//! The account record and its invariants.
//!
//! An [`Account`] is loaded, mutated in memory through the methods here, and
//! written back by the storage layer under an optimistic version check. The
//! methods enforce the two record-level invariants:
//!
//! - the balance never goes negative (it is a `u64`, and every subtraction is
//!   checked before anything changes)
//! - an item id appears in at most one category of the locker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ItemGrant;
use crate::types::{Category, CosmeticId, Email, ExternalId, Rarity};

/// Balance rule violations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    /// Credits and debits must move a positive amount.
    #[error("amount must be greater than zero")]
    ZeroAmount,
    /// The debit exceeds the current balance.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Balance at the time of the attempt.
        balance: u64,
        /// Amount the operation needed.
        required: u64,
    },
    /// The credit would overflow the balance.
    #[error("balance overflow")]
    Overflow,
}

/// One owned cosmetic, with the display data frozen at grant time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerItem {
    pub id: CosmeticId,
    pub name: String,
    pub rarity: Rarity,
    pub season: String,
}

/// Per-category owned item lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locker {
    pub outfits: Vec<LockerItem>,
    pub pickaxes: Vec<LockerItem>,
    pub gliders: Vec<LockerItem>,
    pub backblings: Vec<LockerItem>,
    pub emotes: Vec<LockerItem>,
    pub wraps: Vec<LockerItem>,
}

/// Item counts per locker category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerCounts {
    pub outfits: usize,
    pub pickaxes: usize,
    pub gliders: usize,
    pub backblings: usize,
    pub emotes: usize,
    pub wraps: usize,
    pub total: usize,
}

impl Locker {
    /// The item list for a category.
    #[must_use]
    pub fn items(&self, category: Category) -> &[LockerItem] {
        match category {
            Category::Outfit => &self.outfits,
            Category::Pickaxe => &self.pickaxes,
            Category::Glider => &self.gliders,
            Category::Backbling => &self.backblings,
            Category::Emote => &self.emotes,
            Category::Wrap => &self.wraps,
        }
    }

    fn items_mut(&mut self, category: Category) -> &mut Vec<LockerItem> {
        match category {
            Category::Outfit => &mut self.outfits,
            Category::Pickaxe => &mut self.pickaxes,
            Category::Glider => &mut self.gliders,
            Category::Backbling => &mut self.backblings,
            Category::Emote => &mut self.emotes,
            Category::Wrap => &mut self.wraps,
        }
    }

    /// Find an item in any category.
    #[must_use]
    pub fn find(&self, id: &CosmeticId) -> Option<(Category, &LockerItem)> {
        Category::ALL.iter().find_map(|&category| {
            self.items(category)
                .iter()
                .find(|item| &item.id == id)
                .map(|item| (category, item))
        })
    }

    /// Whether the item is owned, in any category.
    #[must_use]
    pub fn contains(&self, id: &CosmeticId) -> bool {
        self.find(id).is_some()
    }

    /// Add an item. Returns `false` and leaves the locker untouched if the id
    /// is already present in any category.
    pub fn insert(&mut self, category: Category, item: LockerItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items_mut(category).push(item);
        true
    }

    /// Remove an item from one category.
    pub fn remove(&mut self, category: Category, id: &CosmeticId) -> Option<LockerItem> {
        let items = self.items_mut(category);
        let index = items.iter().position(|item| &item.id == id)?;
        Some(items.remove(index))
    }

    #[must_use]
    pub fn counts(&self) -> LockerCounts {
        let mut counts = LockerCounts {
            outfits: self.outfits.len(),
            pickaxes: self.pickaxes.len(),
            gliders: self.gliders.len(),
            backblings: self.backblings.len(),
            emotes: self.emotes.len(),
            wraps: self.wraps.len(),
            total: 0,
        };
        counts.total = counts.outfits
            + counts.pickaxes
            + counts.gliders
            + counts.backblings
            + counts.emotes
            + counts.wraps;
        counts
    }
}

/// Role flags cached from the identity provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_elite_donor: bool,
    pub has_full_locker: bool,
    pub is_booster: bool,
}

/// One-way reward claim flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFlags {
    pub elite_donor_claimed: bool,
    pub full_locker_claimed: bool,
    pub booster_claimed: bool,
}

/// Why, by whom and when an account was banned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanState {
    pub reason: String,
    pub banned_by: String,
    pub banned_at: DateTime<Utc>,
}

/// One end user's economic and entitlement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub external_id: ExternalId,
    pub username: String,
    pub email: Email,
    pub balance: u64,
    pub locker: Locker,
    pub roles: RoleFlags,
    pub claims: ClaimFlags,
    pub ban: Option<BanState>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every committed write.
    #[serde(skip)]
    pub version: i64,
}

impl Account {
    #[must_use]
    pub const fn is_banned(&self) -> bool {
        self.ban.is_some()
    }

    #[must_use]
    pub fn owns(&self, id: &CosmeticId) -> bool {
        self.locker.contains(id)
    }

    /// Increase the balance.
    ///
    /// # Errors
    ///
    /// Returns `ZeroAmount` for a zero credit and `Overflow` if the new
    /// balance does not fit. The balance is unchanged on error.
    pub fn credit(&mut self, amount: u64) -> Result<u64, BalanceError> {
        if amount == 0 {
            return Err(BalanceError::ZeroAmount);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        Ok(self.balance)
    }

    /// Decrease the balance.
    ///
    /// # Errors
    ///
    /// Returns `ZeroAmount` for a zero debit and `InsufficientFunds` if the
    /// amount exceeds the balance. The balance is unchanged on error.
    pub fn debit(&mut self, amount: u64) -> Result<u64, BalanceError> {
        if amount == 0 {
            return Err(BalanceError::ZeroAmount);
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(BalanceError::InsufficientFunds {
                balance: self.balance,
                required: amount,
            })?;
        Ok(self.balance)
    }

    /// Overwrite the balance, returning the previous value.
    pub const fn set_balance(&mut self, amount: u64) -> u64 {
        let previous = self.balance;
        self.balance = amount;
        previous
    }

    /// Add a granted item to the locker. Returns `false` if already owned.
    pub fn grant(&mut self, grant: ItemGrant) -> bool {
        self.locker.insert(grant.category, grant.item)
    }
}
