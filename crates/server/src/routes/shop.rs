//! Public shop endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use dub_core::{CatalogItem, ShopSnapshot};

use super::cosmetic_id;
use crate::error::AppError;
use crate::services::{EconomyError, ShopService};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 10;
const MAX_HISTORY_LIMIT: u32 = 50;

fn service(state: &AppState) -> ShopService<'_> {
    let economy = state.economy();
    ShopService::new(state.store(), &economy.season, &economy.version)
}

#[derive(Debug, Serialize)]
pub struct CurrentShopResponse {
    pub shop: ShopSnapshot,
    pub hours_remaining: i64,
    pub minutes_remaining: i64,
}

/// The live snapshot.
///
/// GET /api/shop/current
///
/// # Errors
///
/// Returns 404 when no snapshot is live.
pub async fn current(State(state): State<AppState>) -> Result<Json<CurrentShopResponse>, AppError> {
    let now = Utc::now();
    let shop = service(&state)
        .current(now)
        .await?
        .ok_or(EconomyError::NotFound("shop"))?;

    let remaining = shop.time_remaining(now);
    Ok(Json(CurrentShopResponse {
        hours_remaining: remaining.num_hours(),
        minutes_remaining: remaining.num_minutes() % 60,
        shop,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ShopHistoryResponse {
    pub shops: Vec<ShopSnapshot>,
    pub page: u32,
}

/// Past and present snapshots, newest first.
///
/// GET /api/shop/history?page=1&limit=10
///
/// # Errors
///
/// Returns 400 for a page below 1 or a limit outside 1 to 50.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ShopHistoryResponse>, AppError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if page == 0 || !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "page must be at least 1 and limit between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let offset = i64::from(page - 1) * i64::from(limit);
    let shops = service(&state).history(offset, i64::from(limit)).await?;
    Ok(Json(ShopHistoryResponse { shops, page }))
}

/// Catalog lookup.
///
/// GET /api/shop/item/{id}
///
/// # Errors
///
/// Returns 404 for an unknown item.
pub async fn item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogItem>, AppError> {
    let id = cosmetic_id(&id)?;
    Ok(Json(service(&state).item(&id).await?))
}
