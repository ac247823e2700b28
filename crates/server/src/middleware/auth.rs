//! Bearer-token extractors.
//!
//! `Authorization: Bearer <token>` is verified against the token signer and
//! resolved to the current account. Banned accounts are refused everywhere
//! except `RequireToken`, which only backs the token verification route.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use dub_core::Account;

use crate::error::{AppError, set_sentry_user};
use crate::services::{AuthService, EconomyError};
use crate::state::AppState;

/// Extractor that requires a valid bearer token, whatever the ban state.
pub struct RequireToken(pub Account);

/// Extractor that requires a valid bearer token for an account that is not banned.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAccount(account): RequireAccount) -> impl IntoResponse {
///     account.username
/// }
/// ```
pub struct RequireAccount(pub Account);

/// Extractor that requires a valid bearer token for an admin account.
pub struct RequireAdmin(pub Account);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))
}

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let economy = state.economy();
        let account = AuthService::new(state.store(), state.tokens(), &economy.starter)
            .verify(token)
            .await?;

        Span::current().record("account", account.external_id.as_str());
        set_sentry_user(account.external_id.as_str(), &account.username);

        Ok(Self(account))
    }
}

impl FromRequestParts<AppState> for RequireAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireToken(account) = RequireToken::from_request_parts(parts, state).await?;
        if let Some(ban) = &account.ban {
            return Err(EconomyError::Banned(ban.clone()).into());
        }
        Ok(Self(account))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAccount(account) = RequireAccount::from_request_parts(parts, state).await?;
        if !account.roles.is_admin {
            return Err(AppError::Forbidden("admin role required".to_string()));
        }
        Ok(Self(account))
    }
}
