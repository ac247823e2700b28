//! Credential service.
//!
//! Password registration and login with Argon2id hashes, plus the signed
//! bearer tokens that identify an account on later requests.

mod error;
mod token;

pub use error::AuthError;
pub use token::{IssuedToken, TokenSigner};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use dub_core::{Account, ClaimFlags, Email, ExternalId, Locker, RoleFlags, StarterKit};

use crate::db::Store;
use crate::services::{EconomyError, LedgerService};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 128;
/// Username length bounds, in characters.
const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=32;

/// Registration input.
#[derive(Debug, Clone)]
pub struct Registration<'r> {
    pub external_id: &'r str,
    pub username: &'r str,
    pub email: &'r str,
    pub password: &'r str,
}

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenSigner,
    starter: &'a StarterKit,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenSigner, starter: &'a StarterKit) -> Self {
        Self {
            store,
            tokens,
            starter,
        }
    }

    /// Register a new account with the starter kit.
    ///
    /// # Errors
    ///
    /// Returns a validation variant for malformed input, `PasswordHash` if
    /// hashing fails, and `Economy(AlreadyExists)` naming the duplicate field.
    #[instrument(skip_all, fields(external_id = %registration.external_id))]
    pub async fn register(&self, registration: &Registration<'_>) -> Result<Account, AuthError> {
        let external_id = ExternalId::parse(registration.external_id)?;
        let email = Email::parse(registration.email)?;
        let username = validate_username(registration.username)?;
        validate_password(registration.password)?;

        let password_hash = hash_password(registration.password)?;

        let account = Account {
            external_id,
            username,
            email,
            balance: 0,
            locker: Locker::default(),
            roles: RoleFlags::default(),
            claims: ClaimFlags::default(),
            ban: None,
            created_at: Utc::now(),
            last_login: None,
            version: 0,
        };

        let account = LedgerService::new(self.store)
            .open_account(account, &password_hash, self.starter)
            .await?;
        info!(username = %account.username, "Account registered");
        Ok(account)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the email is unknown or the password is
    /// wrong, and `Economy(Banned)` for a banned account.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, IssuedToken), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (mut account, password_hash) = self
            .store
            .get_credentials(&email)
            .await
            .map_err(EconomyError::from)?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if let Some(ban) = &account.ban {
            warn!(external_id = %account.external_id, "Login attempt on banned account");
            return Err(EconomyError::Banned(ban.clone()).into());
        }

        let now = Utc::now();
        self.store
            .record_login(&account.external_id, now)
            .await
            .map_err(EconomyError::from)?;
        account.last_login = Some(now);

        let token = self.tokens.issue(&account.external_id, now);
        info!(external_id = %account.external_id, "Login succeeded");
        Ok((account, token))
    }

    /// Resolve a bearer token to its account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken`, `ExpiredToken`, or `InvalidToken` again when
    /// the account no longer exists.
    pub async fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let id = self.tokens.verify(token, Utc::now())?;
        self.store
            .get_account(&id)
            .await
            .map_err(EconomyError::from)?
            .ok_or(AuthError::InvalidToken)
    }
}

/// Validate and trim a username.
fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    let len = username.chars().count();
    if !USERNAME_LENGTH.contains(&len) {
        return Err(AuthError::InvalidUsername(format!(
            "username must be {} to {} characters",
            USERNAME_LENGTH.start(),
            USERNAME_LENGTH.end()
        )));
    }
    Ok(username.to_owned())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
