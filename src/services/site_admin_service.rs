//! Entry points for the admin console: manual refresh and interval updates.
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::db::entities::SiteStatusUpdate;
use crate::db::{SiteStore, StoreError, CHECK_INTERVAL_KEY};
use crate::monitoring::probe::{ProbeError, ProbeOutcome, SiteProbe};
use crate::monitoring::scheduler::validate_interval;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Site not found: {0}")]
    SiteNotFound(i32),
    #[error("Check interval must be between 1 and 10080 minutes, got {0}")]
    InvalidInterval(i64),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),
}

pub struct SiteAdminService {
    store: Arc<dyn SiteStore>,
    prober: Arc<dyn SiteProbe>,
}

impl SiteAdminService {
    pub fn new(store: Arc<dyn SiteStore>, prober: Arc<dyn SiteProbe>) -> Self {
        Self { store, prober }
    }

    /// Probes one site now and stores the result. Sends no alerts.
    ///
    /// `last_notified` is cleared when the site is up and kept otherwise, so
    /// an outage already alerted on stays throttled.
    /// Refreshing a down site that has come back absorbs its recovery alert:
    /// the next cycle sees it as already up.
    pub async fn refresh_one(&self, site_id: i32) -> Result<ProbeOutcome, AdminError> {
        let site = self
            .store
            .get_site(site_id)
            .await?
            .ok_or(AdminError::SiteNotFound(site_id))?;

        let outcome = self.prober.probe(&site.url).await?;
        let notified_at = if outcome.available {
            None
        } else {
            site.last_notified
        };

        self.store
            .update_site_status(
                site.id,
                SiteStatusUpdate {
                    is_available: outcome.available,
                    checked_at: Utc::now(),
                    notified_at,
                },
            )
            .await?;

        info!(site_id, url = %site.url, available = outcome.available, "Site refreshed manually.");
        Ok(outcome)
    }

    /// Persists a new monitoring interval. The running schedule picks it up
    /// on its next reconciliation tick.
    pub async fn set_check_interval(&self, minutes: i64) -> Result<(), AdminError> {
        if validate_interval(minutes).is_none() {
            return Err(AdminError::InvalidInterval(minutes));
        }
        self.store.write_setting(CHECK_INTERVAL_KEY, minutes).await?;
        info!(interval_minutes = minutes, "Check interval updated.");
        Ok(())
    }

    pub async fn check_interval(&self) -> Result<Option<i64>, AdminError> {
        Ok(self.store.read_setting(CHECK_INTERVAL_KEY).await?)
    }
}
