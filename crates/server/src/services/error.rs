//! Economy error taxonomy.

use thiserror::Error;

use dub_core::{BalanceError, BanState, ClaimDenial, CosmeticId, RewardKind};

use crate::db::RepositoryError;

/// Errors returned by ledger, reward and shop operations.
///
/// Every refusal is a distinct variant so callers can tell, for example, an
/// already-claimed reward from a missing role.
#[derive(Debug, Error)]
pub enum EconomyError {
    /// Account, item or shop snapshot absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate registration. Names the clashing field.
    #[error("an account with this {0} already exists")]
    AlreadyExists(String),

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("item {0} is already owned")]
    AlreadyOwned(CosmeticId),

    #[error("item {0} is not owned")]
    ItemNotOwned(CosmeticId),

    #[error("item {0} is not in the current shop")]
    ItemNotInShop(CosmeticId),

    #[error("the {0} reward has already been claimed")]
    AlreadyClaimed(RewardKind),

    #[error("the {0} reward requires the matching role")]
    RoleRequired(RewardKind),

    #[error("cannot gift an item to yourself")]
    SelfGift,

    #[error("account is banned: {}", .0.reason)]
    Banned(BanState),

    /// Malformed input.
    #[error("{0}")]
    ValidationFailed(String),

    /// The account changed between load and write. Safe to retry.
    #[error("account was modified concurrently, please retry")]
    ConcurrentModification,

    #[error("storage failure: {0}")]
    Storage(RepositoryError),
}

impl EconomyError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AlreadyOwned(_) => "already_owned",
            Self::ItemNotOwned(_) => "item_not_owned",
            Self::ItemNotInShop(_) => "item_not_in_shop",
            Self::AlreadyClaimed(_) => "already_claimed",
            Self::RoleRequired(_) => "role_required",
            Self::SelfGift => "self_gift",
            Self::Banned(_) => "banned",
            Self::ValidationFailed(_) => "validation_failed",
            Self::ConcurrentModification => "concurrent_modification",
            Self::Storage(_) => "storage_failure",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::ConcurrentModification)
    }
}

impl From<RepositoryError> for EconomyError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict(_) => Self::ConcurrentModification,
            RepositoryError::Conflict(field) => Self::AlreadyExists(field),
            RepositoryError::NotFound => Self::NotFound("record"),
            other => Self::Storage(other),
        }
    }
}

impl From<BalanceError> for EconomyError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::InsufficientFunds { balance, required } => {
                Self::InsufficientFunds { balance, required }
            }
            BalanceError::ZeroAmount | BalanceError::Overflow => {
                Self::ValidationFailed(err.to_string())
            }
        }
    }
}

impl From<ClaimDenial> for EconomyError {
    fn from(denial: ClaimDenial) -> Self {
        match denial {
            ClaimDenial::AlreadyClaimed(kind) => Self::AlreadyClaimed(kind),
            ClaimDenial::RoleRequired(kind) => Self::RoleRequired(kind),
        }
    }
}
