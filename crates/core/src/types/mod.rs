//! Core types for Dub.
//!
//! This module provides type-safe wrappers for identifiers and the closed
//! enumerations used across the economy.

pub mod cosmetic;
pub mod email;
pub mod external_id;
pub mod id;
pub mod payment;

pub use cosmetic::{Availability, Category, CosmeticId, CosmeticIdError, ItemType, ParseEnumError, Rarity};
pub use email::{Email, EmailError};
pub use external_id::{ExternalId, ExternalIdError};
pub use id::*;
pub use payment::{PaymentMethod, PaymentStatus};
