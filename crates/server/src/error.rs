//! Unified error handling for the HTTP API.
//!
//! Every error becomes a JSON body `{"error": <code>, "message": <text>}`.
//! Storage and internal details are logged and sent to Sentry, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{AuthError, EconomyError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Ledger, reward or shop refusal.
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// Registration, login or token failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Missing or malformed credentials on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but lacking the admin role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Economy(e) | Self::Auth(AuthError::Economy(e)) => economy_status(e),
            Self::Auth(
                AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::ExpiredToken,
            )
            | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::PasswordHash) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Economy(e) | Self::Auth(AuthError::Economy(e)) => e.code(),
            Self::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            Self::Auth(AuthError::InvalidToken) => "invalid_token",
            Self::Auth(AuthError::ExpiredToken) => "expired_token",
            Self::Auth(AuthError::PasswordHash) | Self::Internal(_) => "internal_error",
            Self::Auth(_) | Self::BadRequest(_) => "validation_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
        }
    }
}

const fn economy_status(err: &EconomyError) -> StatusCode {
    match err {
        EconomyError::NotFound(_) => StatusCode::NOT_FOUND,
        EconomyError::AlreadyExists(_) | EconomyError::ConcurrentModification => {
            StatusCode::CONFLICT
        }
        EconomyError::RoleRequired(_) | EconomyError::Banned(_) => StatusCode::FORBIDDEN,
        EconomyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EconomyError::InsufficientFunds { .. }
        | EconomyError::AlreadyOwned(_)
        | EconomyError::ItemNotOwned(_)
        | EconomyError::ItemNotInShop(_)
        | EconomyError::AlreadyClaimed(_)
        | EconomyError::SelfGift
        | EconomyError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Set the Sentry user context from an account.
pub fn set_sentry_user(external_id: &str, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(external_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use dub_core::RewardKind;

    use super::*;
    use crate::db::RepositoryError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");

        let err = AppError::from(EconomyError::SelfGift);
        assert_eq!(err.to_string(), "cannot gift an item to yourself");
    }

    #[test]
    fn test_economy_status_codes() {
        assert_eq!(
            get_status(EconomyError::NotFound("account").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(EconomyError::AlreadyExists("email".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                EconomyError::InsufficientFunds {
                    balance: 1,
                    required: 2
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(EconomyError::AlreadyClaimed(RewardKind::Booster).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(EconomyError::RoleRequired(RewardKind::Booster).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(EconomyError::ConcurrentModification.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                EconomyError::Storage(RepositoryError::Unavailable("down".to_string())).into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(
            get_status(AuthError::ExpiredToken.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::WeakPassword("short".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::Economy(EconomyError::AlreadyExists("email".to_string())).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Forbidden("admin".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_codes_are_distinct_for_claim_denials() {
        let claimed = AppError::from(EconomyError::AlreadyClaimed(RewardKind::EliteDonor));
        let role = AppError::from(EconomyError::RoleRequired(RewardKind::EliteDonor));
        assert_ne!(claimed.code(), role.code());
    }
}
