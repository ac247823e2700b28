//! Shop rotation and the background rotation check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use dub_core::{CatalogItem, CosmeticId, Rotation, ShopSnapshot};

use crate::db::Store;

use super::EconomyError;

/// Created-by label for rotations made by the background check.
pub const SYSTEM_ROTATION: &str = "system";

/// Shop rotation operations.
pub struct ShopService<'a> {
    store: &'a dyn Store,
    season: &'a str,
    version: &'a str,
}

impl<'a> ShopService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, season: &'a str, version: &'a str) -> Self {
        Self {
            store,
            season,
            version,
        }
    }

    /// Supersede the active snapshot with a fresh random selection that is
    /// live for 24 hours.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` if the catalog has no shop-eligible items,
    /// or `Storage`.
    #[instrument(skip(self))]
    pub async fn rotate(&self, created_by: &str) -> Result<ShopSnapshot, EconomyError> {
        let catalog = self.store.list_catalog().await?;
        let rotation = Rotation::select(&catalog, &mut rand::rng());
        if rotation.is_empty() {
            return Err(EconomyError::ValidationFailed(
                "the catalog has no shop-eligible items".to_owned(),
            ));
        }

        let snapshot = rotation.into_snapshot(Utc::now(), self.season, self.version, created_by);
        let snapshot = self.store.replace_active_shop(snapshot).await?;
        info!(
            snapshot = %snapshot.id,
            items = snapshot.item_count(),
            expires_at = %snapshot.expires_at,
            "Shop rotated"
        );
        Ok(snapshot)
    }

    /// The active snapshot, if it has not expired.
    ///
    /// # Errors
    ///
    /// Returns `Storage`.
    pub async fn current(&self, now: DateTime<Utc>) -> Result<Option<ShopSnapshot>, EconomyError> {
        Ok(self
            .store
            .active_shop()
            .await?
            .filter(|shop| shop.is_live(now)))
    }

    /// Rotate if no live snapshot exists. Returns the new snapshot, or `None`
    /// if the current one is still live.
    ///
    /// # Errors
    ///
    /// Same as [`Self::rotate`].
    pub async fn ensure_current(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<ShopSnapshot>, EconomyError> {
        if self.current(now).await?.is_some() {
            return Ok(None);
        }
        self.rotate(SYSTEM_ROTATION).await.map(Some)
    }

    /// Past and present snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage`.
    pub async fn history(&self, offset: i64, limit: i64) -> Result<Vec<ShopSnapshot>, EconomyError> {
        Ok(self.store.shop_history(offset, limit).await?)
    }

    /// Catalog lookup by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Storage`.
    pub async fn item(&self, id: &CosmeticId) -> Result<CatalogItem, EconomyError> {
        self.store
            .get_cosmetic(id)
            .await?
            .ok_or(EconomyError::NotFound("item"))
    }
}

// ============================================================================
// Background rotation check
// ============================================================================

/// Handle to the running rotation check. Dropping it also stops the task.
pub struct RotationTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RotationTask {
    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Shop rotation task panicked");
        }
    }
}

/// Spawn a task that checks the shop every `period` (first check
/// immediately) and rotates when no live snapshot exists.
pub fn spawn_rotation_task(
    store: Arc<dyn Store>,
    season: String,
    version: String,
    period: Duration,
) -> RotationTask {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Shop rotation task started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let shop = ShopService::new(store.as_ref(), &season, &version);
                    match shop.ensure_current(Utc::now()).await {
                        Ok(Some(snapshot)) => {
                            info!(snapshot = %snapshot.id, "Scheduled rotation created a new shop");
                        }
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "Scheduled shop rotation failed"),
                    }
                }
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        info!("Shop rotation handle dropped, stopping task");
                        break;
                    }
                    if *cancel_rx.borrow() {
                        info!("Shop rotation task stopped");
                        break;
                    }
                }
            }
        }
    });

    RotationTask {
        cancel: cancel_tx,
        handle,
    }
}
