//! External identity key.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`ExternalId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalIdError {
    /// The input has the wrong number of characters.
    #[error("external id must be {min}-{max} digits (got {len})")]
    Length {
        /// Minimum allowed length.
        min: usize,
        /// Maximum allowed length.
        max: usize,
        /// Length of the rejected input.
        len: usize,
    },
    /// The input contains something other than ASCII digits.
    #[error("external id must contain only digits")]
    NotNumeric,
}

/// The identity provider's stable key for an account.
///
/// Accounts are keyed by the chat platform's snowflake id, a 17-19 digit
/// decimal string. It is kept as text: snowflakes exceed what JSON clients
/// can hold in a double.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Minimum length of a snowflake id.
    pub const MIN_LENGTH: usize = 17;
    /// Maximum length of a snowflake id.
    pub const MAX_LENGTH: usize = 19;

    /// Parse an `ExternalId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is not 17-19 ASCII digits.
    pub fn parse(s: &str) -> Result<Self, ExternalIdError> {
        let s = s.trim();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(ExternalIdError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
                len: s.len(),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExternalIdError::NotNumeric);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ExternalId {
    type Err = ExternalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = ExternalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ExternalId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExternalId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ExternalId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_snowflakes() {
        assert!(ExternalId::parse("12345678901234567").is_ok());
        assert!(ExternalId::parse("123456789012345678").is_ok());
        assert!(ExternalId::parse("1234567890123456789").is_ok());
        assert_eq!(
            ExternalId::parse(" 123456789012345678 ").unwrap().as_str(),
            "123456789012345678"
        );
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!(matches!(
            ExternalId::parse("1234"),
            Err(ExternalIdError::Length { len: 4, .. })
        ));
        assert!(matches!(
            ExternalId::parse("12345678901234567890"),
            Err(ExternalIdError::Length { len: 20, .. })
        ));
    }

    #[test]
    fn test_parse_not_numeric() {
        assert_eq!(
            ExternalId::parse("12345678901234567a"),
            Err(ExternalIdError::NotNumeric)
        );
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: ExternalId = serde_json::from_str("\"123456789012345678\"").unwrap();
        assert_eq!(ok.to_string(), "123456789012345678");
        assert!(serde_json::from_str::<ExternalId>("\"abc\"").is_err());
    }
}
