//! Business logic services.
//!
//! # Services
//!
//! - `ledger` - Balance and locker mutations, each paired with its audit entry
//! - `rewards` - Role-gated, at-most-once reward claims
//! - `shop` - Shop rotation and the background rotation check
//! - `admin` - Bans, corrections and account management
//! - `auth` - Password registration/login and signed bearer tokens
//! - `email` - Email notifications via SMTP
//!
//! Every service borrows a `&dyn Store` and is cheap to construct per request.

pub mod admin;
pub mod auth;
pub mod email;
pub mod error;
pub mod ledger;
pub mod rewards;
pub mod shop;

#[cfg(test)]
pub(crate) mod fixtures;

pub use admin::{AccountView, AdminService, MAX_ADMIN_VBUCKS, RoleUpdate};
pub use auth::{AuthError, AuthService, IssuedToken, Registration, TokenSigner};
pub use email::{EmailError, EmailService, Receipt, Welcome};
pub use error::EconomyError;
pub use ledger::{Gift, GrantOutcome, LedgerPage, LedgerService, MAX_PAGE_SIZE, Purchase, Reason};
pub use rewards::{ClaimOutcome, GRANT_BATCH_SIZE, RewardService, RewardStatus};
pub use shop::{RotationTask, SYSTEM_ROTATION, ShopService, spawn_rotation_task};
