//! Registration, login and token verification.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use dub_core::{Account, BanState};

use crate::error::AppError;
use crate::middleware::RequireToken;
use crate::services::{AuthService, Registration, Welcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public view of a freshly created or logged-in account.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub balance: u64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            external_id: account.external_id.to_string(),
            username: account.username.clone(),
            email: account.email.to_string(),
            balance: account.balance,
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}

/// Create an account with the starter kit.
///
/// POST /api/auth/register
///
/// # Errors
///
/// Returns 400 for invalid input and 409 when the email or external id is
/// taken.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountSummary>), AppError> {
    let starter = &state.economy().starter;
    let registration = Registration {
        external_id: &request.external_id,
        username: &request.username,
        email: &request.email,
        password: &request.password,
    };
    let account = AuthService::new(state.store(), state.tokens(), starter)
        .register(&registration)
        .await?;

    if let Some(email) = state.email() {
        email.notify_welcome(Welcome {
            to: account.email.to_string(),
            username: account.username.clone(),
            vbucks: starter.vbucks,
            starter_item: starter.item.name.clone(),
        });
    }

    Ok((StatusCode::CREATED, Json(AccountSummary::from(&account))))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

/// Exchange email and password for a bearer token.
///
/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 for bad credentials and 403 for a banned account.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (account, token) =
        AuthService::new(state.store(), state.tokens(), &state.economy().starter)
            .login(&request.email, &request.password)
            .await?;

    Ok(Json(LoginResponse {
        token: token.token,
        expires_at: token.expires_at,
        account: AccountSummary::from(&account),
    }))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub external_id: String,
    pub username: String,
    pub is_admin: bool,
    pub ban: Option<BanState>,
}

/// Report token validity and ban state.
///
/// GET /api/auth/verify
pub async fn verify(RequireToken(account): RequireToken) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        external_id: account.external_id.to_string(),
        username: account.username,
        is_admin: account.roles.is_admin,
        ban: account.ban,
    })
}
