//! Signed bearer tokens.
//!
//! A token is `<external id>.<expiry unix seconds>.<hex HMAC-SHA256>` where the
//! MAC covers the first two parts. Nothing is stored server-side.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use dub_core::ExternalId;

use super::AuthError;

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    fn sign(&self, payload: &str) -> String {
        // HMAC accepts keys of any length.
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            return String::new();
        };
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Issue a token for `id`, valid until `now + ttl`.
    #[must_use]
    pub fn issue(&self, id: &ExternalId, now: DateTime<Utc>) -> IssuedToken {
        let expires_at = now + self.ttl;
        let payload = format!("{id}.{}", expires_at.timestamp());
        let signature = self.sign(&payload);
        IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at,
        }
    }

    /// Check a token and return the account it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token is malformed or the signature does
    /// not match, and `ExpiredToken` if it is past its expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ExternalId, AuthError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (id, expiry) = payload.split_once('.').ok_or(AuthError::InvalidToken)?;

        if !constant_time_compare(&self.sign(payload), signature) {
            return Err(AuthError::InvalidToken);
        }

        let id = ExternalId::parse(id).map_err(|_| AuthError::InvalidToken)?;
        let expiry: i64 = expiry.parse().map_err(|_| AuthError::InvalidToken)?;
        let expires_at = Utc
            .timestamp_opt(expiry, 0)
            .single()
            .ok_or(AuthError::InvalidToken)?;
        if now >= expires_at {
            return Err(AuthError::ExpiredToken);
        }
        Ok(id)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(
            SecretString::from("kX9#mP2$vL5@nQ8&wR3*jT6!bY4^cF7%".to_owned()),
            Duration::days(30),
        )
    }

    fn player() -> ExternalId {
        ExternalId::parse("123456789012345678").unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = signer();
        let now = Utc::now();
        let issued = signer.issue(&player(), now);

        assert_eq!(signer.verify(&issued.token, now).unwrap(), player());
        assert_eq!(issued.expires_at, now + Duration::days(30));
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let now = Utc::now();
        let issued = signer.issue(&player(), now);

        let later = now + Duration::days(31);
        assert!(matches!(
            signer.verify(&issued.token, later),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_tampered_token() {
        let signer = signer();
        let now = Utc::now();
        let issued = signer.issue(&player(), now);

        let forged = issued.token.replacen("123456789012345678", "876543210987654321", 1);
        assert!(matches!(
            signer.verify(&forged, now),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            signer.verify("not-a-token", now),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_other_secret_rejected() {
        let now = Utc::now();
        let issued = signer().issue(&player(), now);
        let other = TokenSigner::new(
            SecretString::from("a-completely-different-secret-value!".to_owned()),
            Duration::days(30),
        );
        assert!(matches!(
            other.verify(&issued.token, now),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("kX9"));
    }
}
