//! Shared test setup for the service tests.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};

use dub_core::{
    Account, Availability, CatalogItem, ClaimFlags, CosmeticId, Email, ExternalId, Introduction,
    ItemType, Locker, NewShopSnapshot, Rarity, RoleFlags, ShopEntry, ShopSection, ShopSnapshot,
    StarterKit,
};

use crate::db::Store;

use super::LedgerService;

pub const PLAYER_A: &str = "111111111111111111";
pub const PLAYER_B: &str = "222222222222222222";

pub fn id(raw: &str) -> ExternalId {
    ExternalId::parse(raw).unwrap()
}

/// A new, unsaved account with no balance or items.
pub fn blank_account(raw: &str) -> Account {
    Account {
        external_id: id(raw),
        username: format!("player{raw}"),
        email: Email::parse(&format!("{raw}@example.com")).unwrap(),
        balance: 0,
        locker: Locker::default(),
        roles: RoleFlags::default(),
        claims: ClaimFlags::default(),
        ban: None,
        created_at: Utc::now(),
        last_login: None,
        version: 0,
    }
}

/// Register an account with the default starter kit.
pub async fn open(store: &dyn Store, raw: &str) -> Account {
    LedgerService::new(store)
        .open_account(blank_account(raw), "hash", &StarterKit::default())
        .await
        .unwrap()
}

pub fn catalog_item_at(raw: &str, item_type: ItemType, price: u64, version: &str) -> CatalogItem {
    CatalogItem {
        id: CosmeticId::parse(raw).unwrap(),
        name: format!("{raw} name"),
        description: None,
        item_type,
        rarity: Rarity::Rare,
        price,
        introduced: Introduction {
            season: "12".to_owned(),
            version: version.to_owned(),
            chapter: Some(2),
        },
        availability: Availability::Shop,
    }
}

pub fn catalog_item(raw: &str, item_type: ItemType, price: u64) -> CatalogItem {
    catalog_item_at(raw, item_type, price, "12.00")
}

pub async fn seed_catalog(store: &dyn Store, items: &[(&str, ItemType, u64)]) {
    for &(raw, item_type, price) in items {
        store
            .upsert_cosmetic(&catalog_item(raw, item_type, price))
            .await
            .unwrap();
    }
}

/// Make a live snapshot offering exactly `ids` (which must be in the catalog).
pub async fn rotate_with(store: &dyn Store, ids: &[&str]) -> ShopSnapshot {
    let mut featured = Vec::new();
    for (raw, order) in ids.iter().zip(0..) {
        let item = store
            .get_cosmetic(&CosmeticId::parse(raw).unwrap())
            .await
            .unwrap()
            .unwrap();
        featured.push(ShopEntry::from_catalog(&item, ShopSection::Featured, order));
    }
    store
        .replace_active_shop(NewShopSnapshot {
            featured,
            daily: Vec::new(),
            special: Vec::new(),
            expires_at: Utc::now() + Duration::hours(24),
            season: "15".to_owned(),
            version: "15.30".to_owned(),
            created_by: "test".to_owned(),
        })
        .await
        .unwrap()
}
