//! Manual shop rotation.

use dub_server::config::EconomyConfig;
use dub_server::services::ShopService;

use super::{CliError, store};

/// Replace the active snapshot now.
///
/// # Errors
///
/// Returns an error if the catalog has nothing to sell or storage fails.
pub async fn rotate(created_by: &str) -> Result<(), CliError> {
    let economy = EconomyConfig::from_env()?;
    let store = store().await?;

    let snapshot = ShopService::new(&store, &economy.season, &economy.version)
        .rotate(created_by)
        .await?;

    tracing::info!(
        snapshot = %snapshot.id,
        featured = snapshot.featured.len(),
        daily = snapshot.daily.len(),
        expires_at = %snapshot.expires_at,
        "Shop rotated"
    );
    Ok(())
}
