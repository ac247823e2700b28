//! Cosmetic identifiers and closed cosmetic enumerations.
//!
//! Every enumeration here is closed: an unknown category or rarity is rejected
//! at the parse boundary and can never reach storage.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known enum variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// What was being parsed (e.g. "category").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum.
///
/// Extra spellings accepted by `FromStr` (plural forms, legacy names) can be
/// listed after the canonical name.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $canonical:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical lowercase name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $canonical),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($canonical $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Errors that can occur when parsing a [`CosmeticId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CosmeticIdError {
    /// The input string is empty.
    #[error("cosmetic id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("cosmetic id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains characters outside `[A-Za-z0-9_-]`.
    #[error("cosmetic id may only contain letters, digits, '_' and '-'")]
    InvalidCharacter,
}

/// A catalog item identifier such as `CID_493_Athena_Commando_F_JurassicArchaeology`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CosmeticId(String);

impl CosmeticId {
    /// Maximum length of a cosmetic id.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `CosmeticId`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, too long, or contains
    /// characters other than ASCII letters, digits, `_` and `-`.
    pub fn parse(s: &str) -> Result<Self, CosmeticIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CosmeticIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CosmeticIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(CosmeticIdError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Wrap a compiled-in id without validation.
    pub(crate) fn from_trusted(s: &str) -> Self {
        Self(s.to_owned())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CosmeticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CosmeticId {
    type Err = CosmeticIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CosmeticId {
    type Error = CosmeticIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CosmeticId> for String {
    fn from(id: CosmeticId) -> Self {
        id.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CosmeticId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CosmeticId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CosmeticId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// A locker category: the list an owned item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Outfit,
    Pickaxe,
    Glider,
    Backbling,
    Emote,
    Wrap,
}

string_enum!(Category, "category", {
    Outfit => "outfit" | "outfits" | "skin" | "skins",
    Pickaxe => "pickaxe" | "pickaxes",
    Glider => "glider" | "gliders",
    Backbling => "backbling" | "backblings",
    Emote => "emote" | "emotes",
    Wrap => "wrap" | "wraps",
});

impl Category {
    /// The catalog item type that lands in this category.
    #[must_use]
    pub const fn item_type(self) -> ItemType {
        match self {
            Self::Outfit => ItemType::Outfit,
            Self::Pickaxe => ItemType::Pickaxe,
            Self::Glider => ItemType::Glider,
            Self::Backbling => ItemType::Backbling,
            Self::Emote => ItemType::Emote,
            Self::Wrap => ItemType::Wrap,
        }
    }

    /// Plural label used for locker sections.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Outfit => "outfits",
            Self::Pickaxe => "pickaxes",
            Self::Glider => "gliders",
            Self::Backbling => "backblings",
            Self::Emote => "emotes",
            Self::Wrap => "wraps",
        }
    }
}

/// The type of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "item_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Outfit,
    Pickaxe,
    Glider,
    Backbling,
    Emote,
    Wrap,
    Bundle,
}

string_enum!(ItemType, "item type", {
    Outfit => "outfit",
    Pickaxe => "pickaxe",
    Glider => "glider",
    Backbling => "backbling",
    Emote => "emote",
    Wrap => "wrap",
    Bundle => "bundle",
});

impl ItemType {
    /// The locker category this type is stored under.
    ///
    /// Bundles are sold as a unit and have no locker category.
    #[must_use]
    pub const fn category(self) -> Option<Category> {
        match self {
            Self::Outfit => Some(Category::Outfit),
            Self::Pickaxe => Some(Category::Pickaxe),
            Self::Glider => Some(Category::Glider),
            Self::Backbling => Some(Category::Backbling),
            Self::Emote => Some(Category::Emote),
            Self::Wrap => Some(Category::Wrap),
            Self::Bundle => None,
        }
    }
}

/// Rarity tier of a cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "rarity", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Marvel,
    Dc,
    Icon,
    Gaming,
}

string_enum!(Rarity, "rarity", {
    Common => "common",
    Uncommon => "uncommon",
    Rare => "rare",
    Epic => "epic",
    Legendary => "legendary",
    Marvel => "marvel",
    Dc => "dc",
    Icon => "icon",
    Gaming => "gaming",
});

/// How a catalog item is obtained.
///
/// Only `Shop` items take part in shop rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "availability", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Shop,
    Battlepass,
    Exclusive,
    Event,
    Starter,
}

string_enum!(Availability, "availability", {
    Shop => "shop",
    Battlepass => "battlepass",
    Exclusive => "exclusive",
    Event => "event",
    Starter => "starter",
});

pub(crate) use string_enum;
