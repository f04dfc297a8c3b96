//! The persistence seam used by the monitoring core.
//!
//! Rows are created and deleted elsewhere (the bot front-end and the admin
//! console); this crate only reads sites, writes their status columns and
//! reads/writes integer settings.
use async_trait::async_trait;
use thiserror::Error;

use super::entities::{SiteStatusUpdate, TrackedSite};

/// Key of the persisted monitoring interval, in minutes.
pub const CHECK_INTERVAL_KEY: &str = "check_interval_minutes";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Site not found: {0}")]
    SiteNotFound(i32),
    #[error("Setting '{key}' does not hold an integer: {value}")]
    InvalidSetting { key: String, value: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Access to sites and settings. Implementations must tolerate concurrent
/// callers; every per-site pipeline in a cycle shares one instance.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Every tracked site across all owners, in one read.
    async fn list_all_sites_with_owners(&self) -> Result<Vec<TrackedSite>, StoreError>;

    async fn get_site(&self, site_id: i32) -> Result<Option<TrackedSite>, StoreError>;

    /// Writes `is_available`, `last_checked` and `last_notified` in a single
    /// statement. Fails with `SiteNotFound` when the row is gone.
    async fn update_site_status(
        &self,
        site_id: i32,
        update: SiteStatusUpdate,
    ) -> Result<(), StoreError>;

    async fn read_setting(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn write_setting(&self, key: &str, value: i64) -> Result<(), StoreError>;
}
