//! Admin rights and role flags.
//!
//! The HTTP API cannot promote accounts; this is the only way an account
//! becomes an admin.

use dub_server::services::{AdminService, RoleUpdate};

use super::{CliError, parse_external_id, store};

/// Grant or revoke admin rights.
///
/// # Errors
///
/// Returns an error for an unknown account or a storage failure.
pub async fn set_admin(external_id: &str, is_admin: bool) -> Result<(), CliError> {
    let id = parse_external_id(external_id)?;
    let store = store().await?;

    let account = AdminService::new(&store).set_admin(&id, is_admin).await?;
    tracing::info!(
        external_id = %account.external_id,
        username = %account.username,
        is_admin,
        "Admin flag updated"
    );
    Ok(())
}

/// Apply role flags.
///
/// # Errors
///
/// Returns an error if no flag is given, for an unknown account, or on a
/// storage failure.
pub async fn set_roles(external_id: &str, update: RoleUpdate) -> Result<(), CliError> {
    if update.elite_donor.is_none() && update.full_locker.is_none() && update.booster.is_none() {
        return Err(CliError::InvalidArgument(
            "pass at least one of --elite-donor, --full-locker, --booster".to_owned(),
        ));
    }

    let id = parse_external_id(external_id)?;
    let store = store().await?;

    let account = AdminService::new(&store).set_roles(&id, update).await?;
    tracing::info!(
        external_id = %account.external_id,
        roles = ?account.roles,
        "Roles updated"
    );
    Ok(())
}
