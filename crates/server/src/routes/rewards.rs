//! Role reward endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use dub_core::{AvailableReward, ClaimFlags, ParseEnumError, RewardKind};

use crate::error::AppError;
use crate::middleware::RequireAccount;
use crate::services::{ClaimOutcome, RewardService};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub available: Vec<AvailableReward>,
    pub claims: ClaimFlags,
}

/// Rewards the caller may claim now.
///
/// GET /api/rewards
///
/// # Errors
///
/// Returns 404 if the account has been deleted since the token was issued.
pub async fn available(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
) -> Result<Json<RewardsResponse>, AppError> {
    let status = RewardService::new(state.store(), &state.economy().rewards)
        .available(&account.external_id)
        .await?;
    Ok(Json(RewardsResponse {
        available: status.available,
        claims: status.claims,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub kind: RewardKind,
    pub vbucks: u64,
    pub items_granted: usize,
    pub balance: u64,
}

impl From<ClaimOutcome> for ClaimResponse {
    fn from(outcome: ClaimOutcome) -> Self {
        Self {
            kind: outcome.kind,
            vbucks: outcome.vbucks,
            items_granted: outcome.items_granted,
            balance: outcome.balance,
        }
    }
}

/// Claim a role reward.
///
/// POST /api/rewards/claim/{kind}
///
/// # Errors
///
/// Returns 400 for an unknown kind or a repeat claim, 403 without the role or
/// for a banned account.
pub async fn claim(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(kind): Path<String>,
) -> Result<Json<ClaimResponse>, AppError> {
    let kind: RewardKind = kind
        .to_ascii_lowercase()
        .parse()
        .map_err(|e: ParseEnumError| AppError::BadRequest(e.to_string()))?;

    let outcome = RewardService::new(state.store(), &state.economy().rewards)
        .claim(&account.external_id, kind)
        .await?;
    Ok(Json(outcome.into()))
}
