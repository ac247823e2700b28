//! Credential service error types.

use thiserror::Error;

use dub_core::{EmailError, ExternalIdError};

use crate::services::EconomyError;

/// Errors that can occur during registration, login and token checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid external id.
    #[error("invalid external id: {0}")]
    InvalidExternalId(#[from] ExternalIdError),

    /// Username outside the allowed length.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Password too weak or too long.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Token is malformed or its signature does not match.
    #[error("invalid token")]
    InvalidToken,

    /// Token signature is valid but its expiry has passed.
    #[error("token expired")]
    ExpiredToken,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Refusal from the account store (duplicate, banned, storage).
    #[error(transparent)]
    Economy(#[from] EconomyError),
}
