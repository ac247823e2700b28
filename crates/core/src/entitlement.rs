//! Role-gated, at-most-once reward rules.
//!
//! The decision logic is pure: [`can_claim`] looks only at the account's role
//! and claim flags, and the grant sets come from an injected [`RewardTable`].
//! Applying a grant and flipping the claim flag is the ledger's job.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::account::{Account, ClaimFlags, LockerItem, RoleFlags};
use crate::catalog::{CatalogItem, ItemGrant};
use crate::types::cosmetic::string_enum;
use crate::types::{Category, CosmeticId, ParseEnumError, Rarity};

/// A claimable reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewardKind {
    EliteDonor,
    FullLocker,
    Booster,
}

string_enum!(RewardKind, "reward kind", {
    EliteDonor => "elite-donor" | "elite_donor" | "elitedonor" | "elite-donator" | "elitedonator",
    FullLocker => "full-locker" | "full_locker" | "fulllocker",
    Booster => "booster",
});

impl RewardKind {
    /// Whether the account holds the role this reward requires.
    #[must_use]
    pub const fn role_held(self, roles: &RoleFlags) -> bool {
        match self {
            Self::EliteDonor => roles.is_elite_donor,
            Self::FullLocker => roles.has_full_locker,
            Self::Booster => roles.is_booster,
        }
    }

    #[must_use]
    pub const fn is_claimed(self, claims: &ClaimFlags) -> bool {
        match self {
            Self::EliteDonor => claims.elite_donor_claimed,
            Self::FullLocker => claims.full_locker_claimed,
            Self::Booster => claims.booster_claimed,
        }
    }

    /// Flip the claim flag. Flags only ever move from `false` to `true`.
    pub const fn mark_claimed(self, claims: &mut ClaimFlags) {
        match self {
            Self::EliteDonor => claims.elite_donor_claimed = true,
            Self::FullLocker => claims.full_locker_claimed = true,
            Self::Booster => claims.booster_claimed = true,
        }
    }
}

/// Why a claim was refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDenial {
    #[error("the {0} reward has already been claimed")]
    AlreadyClaimed(RewardKind),
    #[error("the {0} reward requires the matching role")]
    RoleRequired(RewardKind),
}

/// Decide whether `account` may claim `kind`.
///
/// A claimed flag is checked before the role, so a repeat claim is always
/// `AlreadyClaimed` even if the role was revoked in between.
///
/// # Errors
///
/// Returns the specific [`ClaimDenial`] when the claim is not allowed.
pub const fn can_claim(account: &Account, kind: RewardKind) -> Result<(), ClaimDenial> {
    if kind.is_claimed(&account.claims) {
        return Err(ClaimDenial::AlreadyClaimed(kind));
    }
    if !kind.role_held(&account.roles) {
        return Err(ClaimDenial::RoleRequired(kind));
    }
    Ok(())
}

/// A fixed item handed out by a reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    pub id: CosmeticId,
    pub name: String,
    pub category: Category,
    pub rarity: Rarity,
    pub season: String,
}

impl RewardItem {
    fn new(id: &str, name: &str, category: Category, rarity: Rarity, season: &str) -> Self {
        Self {
            id: CosmeticId::from_trusted(id),
            name: name.to_owned(),
            category,
            rarity,
            season: season.to_owned(),
        }
    }

    #[must_use]
    pub fn grant(&self) -> ItemGrant {
        ItemGrant {
            category: self.category,
            item: LockerItem {
                id: self.id.clone(),
                name: self.name.clone(),
                rarity: self.rarity,
                season: self.season.clone(),
            },
        }
    }
}

/// Currency and items granted by a fixed reward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedReward {
    pub vbucks: u64,
    pub items: Vec<RewardItem>,
}

/// Reward definitions, injected wherever claims are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTable {
    pub elite_donor: FixedReward,
    pub booster: FixedReward,
    /// Highest introduction version granted by the full-locker reward.
    pub full_locker_cutoff: String,
}

impl RewardTable {
    const ELITE_DONOR_SEASON: &'static str = "Elite Donator";
    const BOOSTER_SEASON: &'static str = "Booster";

    /// The fixed grant for a kind. Full locker is catalog-driven and has none.
    #[must_use]
    pub const fn fixed(&self, kind: RewardKind) -> Option<&FixedReward> {
        match kind {
            RewardKind::EliteDonor => Some(&self.elite_donor),
            RewardKind::Booster => Some(&self.booster),
            RewardKind::FullLocker => None,
        }
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            elite_donor: FixedReward {
                vbucks: 5000,
                items: vec![
                    RewardItem::new(
                        "CID_530_Athena_Commando_F_BlackMonday_1BV6J",
                        "Catwoman Comic Book Outfit",
                        Category::Outfit,
                        Rarity::Dc,
                        Self::ELITE_DONOR_SEASON,
                    ),
                    RewardItem::new(
                        "CID_703_Athena_Commando_M_Cyclone",
                        "Travis Scott",
                        Category::Outfit,
                        Rarity::Icon,
                        Self::ELITE_DONOR_SEASON,
                    ),
                    RewardItem::new(
                        "CID_715_Athena_Commando_F_TwinDark",
                        "Echo",
                        Category::Outfit,
                        Rarity::Epic,
                        Self::ELITE_DONOR_SEASON,
                    ),
                    RewardItem::new(
                        "Pickaxe_ID_376_FNCS",
                        "The Axe of Champions",
                        Category::Pickaxe,
                        Rarity::Legendary,
                        Self::ELITE_DONOR_SEASON,
                    ),
                    RewardItem::new(
                        "Pickaxe_ID_179_StarWand",
                        "Star Wand",
                        Category::Pickaxe,
                        Rarity::Rare,
                        Self::ELITE_DONOR_SEASON,
                    ),
                    RewardItem::new(
                        "Pickaxe_ID_014_WinterCamo",
                        "Ice Breaker",
                        Category::Pickaxe,
                        Rarity::Uncommon,
                        Self::ELITE_DONOR_SEASON,
                    ),
                ],
            },
            booster: FixedReward {
                vbucks: 0,
                items: vec![RewardItem::new(
                    "CID_362_Athena_Commando_F_BandageNinja",
                    "Kuno",
                    Category::Outfit,
                    Rarity::Epic,
                    Self::BOOSTER_SEASON,
                )],
            },
            full_locker_cutoff: "15.30".to_owned(),
        }
    }
}

/// What a freshly registered account starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterKit {
    pub vbucks: u64,
    pub item: RewardItem,
}

impl Default for StarterKit {
    fn default() -> Self {
        Self {
            vbucks: 1000,
            item: RewardItem::new(
                "CID_493_Athena_Commando_F_JurassicArchaeology",
                "Crystal",
                Category::Outfit,
                Rarity::Epic,
                "Starter",
            ),
        }
    }
}

/// Catalog items granted by the full-locker reward.
///
/// An item qualifies when it has a locker category and its introduction
/// version is `<=` the cutoff under plain string ordering ("9.10" sorts after
/// "15.30").
pub fn eligible_full_locker_items<'a>(
    catalog: &'a [CatalogItem],
    cutoff: &'a str,
) -> impl Iterator<Item = ItemGrant> + 'a {
    catalog
        .iter()
        .filter(move |item| item.introduced.version.as_str() <= cutoff)
        .filter_map(CatalogItem::grant)
}

/// A reward the account can claim right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableReward {
    pub kind: RewardKind,
    pub vbucks: u64,
    pub items: Vec<RewardItem>,
    /// Version cutoff, for the catalog-driven full-locker reward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

/// Every reward `account` is currently allowed to claim.
#[must_use]
pub fn available_rewards(account: &Account, table: &RewardTable) -> Vec<AvailableReward> {
    [RewardKind::EliteDonor, RewardKind::FullLocker, RewardKind::Booster]
        .into_iter()
        .filter(|&kind| can_claim(account, kind).is_ok())
        .map(|kind| match table.fixed(kind) {
            Some(fixed) => AvailableReward {
                kind,
                vbucks: fixed.vbucks,
                items: fixed.items.clone(),
                max_version: None,
            },
            None => AvailableReward {
                kind,
                vbucks: 0,
                items: Vec::new(),
                max_version: Some(table.full_locker_cutoff.clone()),
            },
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::tests::sample_account;
    use crate::catalog::tests::catalog_item;
    use crate::types::ItemType;

    #[test]
    fn test_can_claim_requires_role() {
        let account = sample_account(0);
        assert_eq!(
            can_claim(&account, RewardKind::EliteDonor),
            Err(ClaimDenial::RoleRequired(RewardKind::EliteDonor))
        );
    }

    #[test]
    fn test_can_claim_allows_role_holder() {
        let mut account = sample_account(0);
        account.roles.is_booster = true;
        assert_eq!(can_claim(&account, RewardKind::Booster), Ok(()));
    }

    #[test]
    fn test_already_claimed_wins_over_missing_role() {
        let mut account = sample_account(0);
        account.roles.has_full_locker = true;
        RewardKind::FullLocker.mark_claimed(&mut account.claims);
        account.roles.has_full_locker = false;
        assert_eq!(
            can_claim(&account, RewardKind::FullLocker),
            Err(ClaimDenial::AlreadyClaimed(RewardKind::FullLocker))
        );
    }

    #[test]
    fn test_full_locker_uses_lexical_cutoff() {
        let catalog = vec![
            catalog_item("CID_old", ItemType::Outfit, 0, "10.00"),
            catalog_item("CID_cutoff", ItemType::Outfit, 0, "15.30"),
            catalog_item("CID_new", ItemType::Outfit, 0, "16.00"),
            catalog_item("CID_nine", ItemType::Emote, 0, "9.10"),
            catalog_item("Bundle_old", ItemType::Bundle, 0, "11.00"),
        ];
        let ids: Vec<String> = eligible_full_locker_items(&catalog, "15.30")
            .map(|grant| grant.item.id.to_string())
            .collect();
        assert_eq!(ids, vec!["CID_old", "CID_cutoff"]);
    }

    #[test]
    fn test_available_rewards_lists_only_claimable() {
        let mut account = sample_account(0);
        account.roles.is_elite_donor = true;
        account.roles.has_full_locker = true;
        account.claims.elite_donor_claimed = true;
        let table = RewardTable::default();
        let available = available_rewards(&account, &table);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].kind, RewardKind::FullLocker);
        assert_eq!(available[0].max_version.as_deref(), Some("15.30"));
    }

    #[test]
    fn test_default_table_matches_configured_rewards() {
        let table = RewardTable::default();
        assert_eq!(table.elite_donor.vbucks, 5000);
        assert_eq!(table.elite_donor.items.len(), 6);
        assert_eq!(table.booster.items[0].name, "Kuno");
        assert!(table.fixed(RewardKind::FullLocker).is_none());
    }

    #[test]
    fn test_fixed_grants_carry_their_own_season() {
        let table = RewardTable::default();
        assert!(
            table
                .elite_donor
                .items
                .iter()
                .all(|item| item.grant().item.season == "Elite Donator")
        );
        assert_eq!(table.booster.items[0].grant().item.season, "Booster");
        assert_eq!(StarterKit::default().item.grant().item.season, "Starter");
    }

    #[test]
    fn test_reward_kind_parses_legacy_names() {
        assert_eq!(
            "elitedonator".parse::<RewardKind>().unwrap(),
            RewardKind::EliteDonor
        );
        assert_eq!("fulllocker".parse::<RewardKind>().unwrap(), RewardKind::FullLocker);
        assert_eq!(RewardKind::EliteDonor.to_string(), "elite-donor");
    }
}
