//! Audit entry types.
//!
//! Every change to an account's balance or locker is paired with exactly one
//! [`NewLedgerEntry`] committed in the same write. Entries are append-only.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::cosmetic::string_enum;
use crate::types::{
    CosmeticId, ExternalId, ItemType, LedgerEntryId, ParseEnumError, PaymentMethod, PaymentStatus,
    Rarity,
};

/// What kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ledger_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Purchase,
    GiftSent,
    GiftReceived,
    AdminGrant,
    RewardClaim,
    Payment,
}

string_enum!(LedgerKind, "ledger kind", {
    Purchase => "purchase",
    GiftSent => "gift_sent",
    GiftReceived => "gift_received",
    AdminGrant => "admin_grant",
    RewardClaim => "reward_claim",
    Payment => "payment",
});

/// Unit of the amount on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "currency", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    Vbucks,
    Usd,
}

/// Frozen description of the item an entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: CosmeticId,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub rarity: Rarity,
}

/// Provider-side details of a recorded external payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Provider transaction reference.
    pub reference: String,
    pub status: PaymentStatus,
    /// Amount paid, in cents.
    pub paid_cents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

/// An entry waiting to be committed alongside its account write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub account: ExternalId,
    pub kind: LedgerKind,
    /// Signed currency change. Zero for item-only mutations.
    pub delta: i64,
    pub currency: Currency,
    pub item: Option<ItemRef>,
    /// The other account in a gift, or the acting admin.
    pub counterparty: Option<ExternalId>,
    pub description: String,
    pub payment: Option<PaymentDetails>,
}

impl NewLedgerEntry {
    /// A vbucks entry with no item attached.
    #[must_use]
    pub fn new(
        account: ExternalId,
        kind: LedgerKind,
        delta: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account,
            kind,
            delta,
            currency: Currency::Vbucks,
            item: None,
            counterparty: None,
            description: description.into(),
            payment: None,
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: ItemRef) -> Self {
        self.item = Some(item);
        self
    }

    #[must_use]
    pub fn with_counterparty(mut self, counterparty: ExternalId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    #[must_use]
    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.currency = Currency::Usd;
        self.payment = Some(payment);
        self
    }
}

/// A committed audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account: ExternalId,
    pub kind: LedgerKind,
    pub delta: i64,
    pub currency: Currency,
    pub item: Option<ItemRef>,
    pub counterparty: Option<ExternalId>,
    pub description: String,
    pub payment: Option<PaymentDetails>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Materialize a committed entry.
    #[must_use]
    pub fn from_new(id: LedgerEntryId, entry: NewLedgerEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            account: entry.account,
            kind: entry.kind,
            delta: entry.delta,
            currency: entry.currency,
            item: entry.item,
            counterparty: entry.counterparty,
            description: entry.description,
            payment: entry.payment,
            created_at,
        }
    }
}

/// Signed delta for a vbucks amount. Amounts above `i64::MAX` saturate.
#[must_use]
pub fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
