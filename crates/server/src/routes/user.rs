//! Account endpoints: profile, locker, balance, purchases, gifts and ledger
//! history. All require a bearer token.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use dub_core::{
    Account, BanState, CatalogItem, ClaimFlags, LedgerEntry, Locker, LockerCounts, RoleFlags,
};

use super::{category, cosmetic_id, external_id};
use crate::error::AppError;
use crate::middleware::RequireAccount;
use crate::services::{LedgerService, Receipt};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub balance: u64,
    pub roles: RoleFlags,
    pub claims: ClaimFlags,
    pub ban: Option<BanState>,
    pub locker: LockerCounts,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            external_id: account.external_id.to_string(),
            username: account.username,
            email: account.email.to_string(),
            balance: account.balance,
            roles: account.roles,
            claims: account.claims,
            ban: account.ban,
            locker: account.locker.counts(),
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}

/// GET /api/user/profile
pub async fn profile(RequireAccount(account): RequireAccount) -> Json<ProfileResponse> {
    Json(account.into())
}

#[derive(Debug, Serialize)]
pub struct LockerResponse {
    pub locker: Locker,
    pub counts: LockerCounts,
}

/// GET /api/user/locker
pub async fn locker(RequireAccount(account): RequireAccount) -> Json<LockerResponse> {
    let counts = account.locker.counts();
    Json(LockerResponse {
        locker: account.locker,
        counts,
    })
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

/// GET /api/user/balance
pub async fn balance(RequireAccount(account): RequireAccount) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        balance: account.balance,
    })
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub item_id: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub item: CatalogItem,
    pub price: u64,
    pub balance: u64,
}

/// Buy an item from the live shop.
///
/// POST /api/user/buy
///
/// # Errors
///
/// Returns the purchase refusal (404, 400 or 403) or 409 on a concurrent
/// write.
#[instrument(skip_all)]
pub async fn buy(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Json(request): Json<BuyRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let item_id = cosmetic_id(&request.item_id)?;
    let category = category(&request.category)?;

    let purchase = LedgerService::new(state.store())
        .purchase(&account.external_id, &item_id, category)
        .await?;

    if let Some(email) = state.email() {
        email.notify_receipt(Receipt {
            to: purchase.account.email.to_string(),
            username: purchase.account.username.clone(),
            item_name: purchase.item.name.clone(),
            price: purchase.price,
            balance: purchase.account.balance,
        });
    }

    Ok(Json(PurchaseResponse {
        balance: purchase.account.balance,
        price: purchase.price,
        item: purchase.item,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GiftRequest {
    pub recipient: String,
    pub item_id: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct GiftResponse {
    pub recipient: String,
    pub recipient_username: String,
    pub item: CatalogItem,
    pub price: u64,
    pub balance: u64,
}

/// Buy an item from the live shop for another account.
///
/// POST /api/user/gift
///
/// # Errors
///
/// Returns 400 for a self-gift, otherwise the same as [`buy`].
#[instrument(skip_all)]
pub async fn gift(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Json(request): Json<GiftRequest>,
) -> Result<Json<GiftResponse>, AppError> {
    let recipient = external_id(&request.recipient)?;
    let item_id = cosmetic_id(&request.item_id)?;
    let category = category(&request.category)?;

    let gift = LedgerService::new(state.store())
        .gift(&account.external_id, &recipient, &item_id, category)
        .await?;

    Ok(Json(GiftResponse {
        recipient: gift.recipient.external_id.to_string(),
        recipient_username: gift.recipient.username,
        balance: gift.sender.balance,
        price: gift.price,
        item: gift.item,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<LedgerEntry>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

/// Ledger history, newest first.
///
/// GET /api/user/transactions?page=1&limit=50
///
/// # Errors
///
/// Returns 400 for a page below 1 or a limit outside 1 to 100.
pub async fn transactions(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Query(query): Query<PageQuery>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let page = LedgerService::new(state.store())
        .history(
            &account.external_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(TransactionsResponse {
        transactions: page.entries,
        total: page.total,
        page: page.page,
        pages: page.pages,
    }))
}
