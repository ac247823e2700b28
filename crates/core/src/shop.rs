//! Shop snapshots and rotation selection.
//!
//! A snapshot is `active` from creation until the next rotation supersedes
//! it. Expiry is never stored as a state; it is derived from `expires_at`.
//! Purchases and gifts only accept items from a snapshot that is live
//! (`active && now < expires_at`).

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::types::{CosmeticId, ItemType, Rarity, ShopSnapshotId};

/// Number of items in the featured section.
pub const FEATURED_SLOTS: usize = 6;
/// Number of items in the daily section.
pub const DAILY_SLOTS: usize = 8;
/// How long a rotation stays live.
pub const SNAPSHOT_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopSection {
    Featured,
    Daily,
    Special,
}

/// A catalog item frozen into a snapshot at rotation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopEntry {
    pub cosmetic_id: CosmeticId,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub rarity: Rarity,
    pub price: u64,
    pub display_order: u32,
    pub section: ShopSection,
}

impl ShopEntry {
    #[must_use]
    pub fn from_catalog(item: &CatalogItem, section: ShopSection, display_order: u32) -> Self {
        Self {
            cosmetic_id: item.id.clone(),
            name: item.name.clone(),
            item_type: item.item_type,
            rarity: item.rarity,
            price: item.price,
            display_order,
            section,
        }
    }
}

/// A snapshot ready to be stored as the new active rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShopSnapshot {
    pub featured: Vec<ShopEntry>,
    pub daily: Vec<ShopEntry>,
    pub special: Vec<ShopEntry>,
    pub expires_at: DateTime<Utc>,
    pub season: String,
    pub version: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSnapshot {
    pub id: ShopSnapshotId,
    pub featured: Vec<ShopEntry>,
    pub daily: Vec<ShopEntry>,
    pub special: Vec<ShopEntry>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub season: String,
    pub version: String,
    pub created_by: String,
}

impl ShopSnapshot {
    /// Materialize a stored snapshot.
    #[must_use]
    pub fn from_new(id: ShopSnapshotId, new: NewShopSnapshot, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            featured: new.featured,
            daily: new.daily,
            special: new.special,
            created_at,
            expires_at: new.expires_at,
            active: true,
            season: new.season,
            version: new.version,
            created_by: new.created_by,
        }
    }

    /// Active and not yet expired.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }

    pub fn entries(&self) -> impl Iterator<Item = &ShopEntry> {
        self.featured
            .iter()
            .chain(self.daily.iter())
            .chain(self.special.iter())
    }

    #[must_use]
    pub fn find(&self, id: &CosmeticId) -> Option<&ShopEntry> {
        self.entries().find(|entry| &entry.cosmetic_id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &CosmeticId) -> bool {
        self.find(id).is_some()
    }

    /// Time left before expiry, clamped at zero.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.featured.len() + self.daily.len() + self.special.len()
    }
}

/// A random selection of shop-eligible items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rotation {
    pub featured: Vec<ShopEntry>,
    pub daily: Vec<ShopEntry>,
}

impl Rotation {
    /// Shuffle the shop-eligible catalog items and deal the first
    /// [`FEATURED_SLOTS`] into featured and the next [`DAILY_SLOTS`] into
    /// daily. No item appears twice.
    pub fn select<R: Rng + ?Sized>(catalog: &[CatalogItem], rng: &mut R) -> Self {
        let mut eligible: Vec<&CatalogItem> = catalog
            .iter()
            .filter(|item| item.is_shop_eligible())
            .collect();
        eligible.shuffle(rng);

        let mut dealt = eligible.into_iter();
        let featured = dealt
            .by_ref()
            .take(FEATURED_SLOTS)
            .zip(0..)
            .map(|(item, order)| ShopEntry::from_catalog(item, ShopSection::Featured, order))
            .collect();
        let daily = dealt
            .take(DAILY_SLOTS)
            .zip(0..)
            .map(|(item, order)| ShopEntry::from_catalog(item, ShopSection::Daily, order))
            .collect();

        Self { featured, daily }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.featured.is_empty() && self.daily.is_empty()
    }

    /// Turn the selection into a snapshot expiring [`SNAPSHOT_LIFETIME_HOURS`]
    /// after `now`.
    #[must_use]
    pub fn into_snapshot(
        self,
        now: DateTime<Utc>,
        season: &str,
        version: &str,
        created_by: &str,
    ) -> NewShopSnapshot {
        NewShopSnapshot {
            featured: self.featured,
            daily: self.daily,
            special: Vec::new(),
            expires_at: now + Duration::hours(SNAPSHOT_LIFETIME_HOURS),
            season: season.to_owned(),
            version: version.to_owned(),
            created_by: created_by.to_owned(),
        }
    }
}
