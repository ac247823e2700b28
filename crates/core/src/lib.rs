//! Dub Core - Domain types and economy rules.
//!
//! This crate provides the types and pure decision logic shared by every Dub
//! component:
//! - `server` - HTTP API, storage and the ledger services
//! - `cli` - Command-line tools for migrations, seeding and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. Every state change it describes is applied to an in-memory
//! value and persisted by the caller.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, external ids, emails and cosmetic enums
//! - [`account`] - The account record, its locker and its balance rules
//! - [`catalog`] - Catalog items and the grants derived from them
//! - [`ledger`] - Audit entry types
//! - [`entitlement`] - Role-gated reward rules and the injected reward table
//! - [`shop`] - Shop snapshots and rotation selection

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod catalog;
pub mod entitlement;
pub mod ledger;
pub mod shop;
pub mod types;

pub use account::{
    Account, BalanceError, BanState, ClaimFlags, Locker, LockerCounts, LockerItem, RoleFlags,
};
pub use catalog::{CatalogItem, Introduction, ItemGrant};
pub use entitlement::{
    AvailableReward, ClaimDenial, FixedReward, RewardItem, RewardKind, RewardTable, StarterKit,
    available_rewards, can_claim, eligible_full_locker_items,
};
pub use ledger::{Currency, ItemRef, LedgerEntry, LedgerKind, NewLedgerEntry, PaymentDetails, signed};
pub use shop::{NewShopSnapshot, Rotation, ShopEntry, ShopSection, ShopSnapshot};
pub use types::*;
