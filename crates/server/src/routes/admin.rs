//! Admin endpoints. Every handler requires an admin bearer token.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use dub_core::{LedgerEntry, ShopSnapshot};

use super::user::ProfileResponse;
use super::{category, cosmetic_id, external_id};
use crate::db::EconomyStats;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::{AdminService, ShopService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub external_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub external_id: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub external_id: String,
    pub item_id: String,
    /// Required when removing; a grant always uses the item's own category.
    pub category: Option<String>,
}

/// POST /api/admin/ban
///
/// # Errors
///
/// Returns 400 for a bad reason or an account that is already banned, 404 for
/// an unknown account.
pub async fn ban(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<BanRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let account = AdminService::new(state.store())
        .ban(&target, &request.reason, &admin)
        .await?;
    Ok(Json(account.into()))
}

/// POST /api/admin/unban
///
/// # Errors
///
/// Returns 400 if the account is not banned, 404 for an unknown account.
pub async fn unban(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(request): Json<TargetRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let account = AdminService::new(state.store()).unban(&target).await?;
    Ok(Json(account.into()))
}

/// POST /api/admin/give-vbucks
///
/// # Errors
///
/// Returns 400 for an amount outside 1 to 1,000,000.
pub async fn give_vbucks(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<AmountRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let account = AdminService::new(state.store())
        .give_vbucks(&target, request.amount, &admin)
        .await?;
    Ok(Json(account.into()))
}

/// POST /api/admin/set-vbucks
///
/// # Errors
///
/// Returns 400 for an amount above 1,000,000.
pub async fn set_vbucks(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<AmountRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let account = AdminService::new(state.store())
        .set_vbucks(&target, request.amount, &admin)
        .await?;
    Ok(Json(account.into()))
}

/// POST /api/admin/give-item
///
/// # Errors
///
/// Returns 404 for an unknown item and 400 if it is already owned.
pub async fn give_item(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<ItemRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let item_id = cosmetic_id(&request.item_id)?;
    let account = AdminService::new(state.store())
        .give_item(&target, &item_id, &admin)
        .await?;
    Ok(Json(account.into()))
}

/// POST /api/admin/remove-item
///
/// # Errors
///
/// Returns 400 without a category or if the item is not in it.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(request): Json<ItemRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = external_id(&request.external_id)?;
    let item_id = cosmetic_id(&request.item_id)?;
    let raw_category = request
        .category
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("category is required".to_string()))?;
    let account = AdminService::new(state.store())
        .remove_item(&target, &item_id, category(raw_category)?)
        .await?;
    Ok(Json(account.into()))
}

#[derive(Debug, Serialize)]
pub struct AccountViewResponse {
    pub account: ProfileResponse,
    pub recent_transactions: Vec<LedgerEntry>,
    pub total_transactions: i64,
}

/// GET /api/admin/accounts/{id}
///
/// # Errors
///
/// Returns 404 for an unknown account.
pub async fn view_account(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<AccountViewResponse>, AppError> {
    let target = external_id(&id)?;
    let view = AdminService::new(state.store()).view(&target).await?;
    Ok(Json(AccountViewResponse {
        account: view.account.into(),
        recent_transactions: view.recent,
        total_transactions: view.entry_count,
    }))
}

/// DELETE /api/admin/accounts/{id}
///
/// # Errors
///
/// Returns 404 for an unknown account.
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = external_id(&id)?;
    AdminService::new(state.store()).delete(&target).await?;
    info!(admin = %admin.external_id, target = %target, "Account deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

/// Rotate the shop now.
///
/// POST /api/admin/refresh-shop
///
/// # Errors
///
/// Returns 400 if the catalog has nothing to sell.
pub async fn refresh_shop(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ShopSnapshot>, AppError> {
    let economy = state.economy();
    let snapshot = ShopService::new(state.store(), &economy.season, &economy.version)
        .rotate(&admin.username)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: EconomyStats,
    pub season: String,
    pub version: String,
}

/// GET /api/admin/stats
///
/// # Errors
///
/// Returns 500 on storage failure.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = AdminService::new(state.store()).stats().await?;
    let economy = state.economy();
    Ok(Json(StatsResponse {
        stats,
        season: economy.season.clone(),
        version: economy.version.clone(),
    }))
}
