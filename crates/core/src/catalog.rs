//! Catalog reference data.

use serde::{Deserialize, Serialize};

use crate::account::LockerItem;
use crate::ledger::ItemRef;
use crate::types::{Availability, Category, CosmeticId, ItemType, Rarity};

/// When a cosmetic first appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introduction {
    pub season: String,
    /// Version label such as `"15.30"`. Compared lexically for full-locker
    /// eligibility.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<i32>,
}

/// A purchasable or grantable cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CosmeticId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub rarity: Rarity,
    pub price: u64,
    pub introduced: Introduction,
    #[serde(default)]
    pub availability: Availability,
}

impl CatalogItem {
    /// Whether the item may be selected into a shop rotation.
    #[must_use]
    pub fn is_shop_eligible(&self) -> bool {
        self.availability == Availability::Shop && self.item_type.category().is_some()
    }

    /// Reference copy recorded on ledger entries.
    #[must_use]
    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            id: self.id.clone(),
            name: self.name.clone(),
            item_type: self.item_type,
            rarity: self.rarity,
        }
    }

    /// The locker grant for this item under its own category.
    ///
    /// Returns `None` for bundles, which have no locker category.
    #[must_use]
    pub fn grant(&self) -> Option<ItemGrant> {
        self.item_type.category().map(|category| ItemGrant {
            category,
            item: LockerItem {
                id: self.id.clone(),
                name: self.name.clone(),
                rarity: self.rarity,
                season: self.introduced.season.clone(),
            },
        })
    }

    /// The locker grant for this item, requiring the caller's category to
    /// match the item's own.
    #[must_use]
    pub fn grant_as(&self, category: Category) -> Option<ItemGrant> {
        self.grant().filter(|grant| grant.category == category)
    }
}

/// An item about to be placed into a locker category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub category: Category,
    pub item: LockerItem,
}

impl ItemGrant {
    #[must_use]
    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            id: self.item.id.clone(),
            name: self.item.name.clone(),
            item_type: self.category.item_type(),
            rarity: self.item.rarity,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn catalog_item(id: &str, item_type: ItemType, price: u64, version: &str) -> CatalogItem {
        CatalogItem {
            id: CosmeticId::parse(id).unwrap(),
            name: format!("{id} name"),
            description: None,
            item_type,
            rarity: Rarity::Epic,
            price,
            introduced: Introduction {
                season: "15".to_owned(),
                version: version.to_owned(),
                chapter: Some(2),
            },
            availability: Availability::Shop,
        }
    }

    #[test]
    fn test_grant_as_requires_matching_category() {
        let item = catalog_item("CID_1", ItemType::Outfit, 1200, "15.10");
        assert!(item.grant_as(Category::Outfit).is_some());
        assert!(item.grant_as(Category::Pickaxe).is_none());
    }

    #[test]
    fn test_bundle_has_no_grant_and_is_not_shop_eligible() {
        let bundle = catalog_item("Bundle_1", ItemType::Bundle, 2000, "15.10");
        assert!(bundle.grant().is_none());
        assert!(!bundle.is_shop_eligible());
    }

    #[test]
    fn test_only_shop_availability_is_eligible() {
        let mut item = catalog_item("CID_2", ItemType::Emote, 500, "14.00");
        assert!(item.is_shop_eligible());
        item.availability = Availability::Battlepass;
        assert!(!item.is_shop_eligible());
    }

    #[test]
    fn test_serde_uses_type_key() {
        let item = catalog_item("CID_3", ItemType::Glider, 800, "13.40");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "glider");
        assert_eq!(json["introduced"]["version"], "13.40");
    }
}
