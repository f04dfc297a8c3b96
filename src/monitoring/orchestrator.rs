//! One monitoring cycle: probe every tracked site, apply the alert policy,
//! persist the new state and notify owners.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::policy::{decide, DEFAULT_RENOTIFY_INTERVAL_MINUTES};
use super::probe::{ProbeError, SiteProbe};
use super::scheduler::ScheduledJob;
use crate::db::entities::{SiteStatusUpdate, TrackedSite};
use crate::db::{SiteStore, StoreError};
use crate::notifications::{AlertMessage, NotificationSender, SenderError};

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Failed to load tracked sites: {0}")]
    LoadFailed(#[from] StoreError),
}

/// Failure of a single site's pipeline. Never aborts the cycle.
#[derive(Error, Debug)]
pub enum SiteCheckError {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),
    #[error("Failed to persist site status: {0}")]
    Persist(#[from] StoreError),
    /// Raised after the new state was already stored.
    #[error("Failed to deliver alert: {0}")]
    Notify(#[from] SenderError),
    #[error("No check slot available: {0}")]
    NoPermit(#[from] AcquireError),
}

/// Upper bound accepted for `max_concurrent_checks`.
pub const MAX_CONCURRENT_CHECKS: usize = 1024;

/// Counters for one cycle.
///
/// `checked` counts sites whose new state was stored, `alerted` counts alerts
/// actually delivered, `failed` counts sites whose pipeline hit any error
/// (a failed delivery after a successful write counts in both `checked` and
/// `failed`), and `skipped` counts sites without a resolvable owner.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub total: usize,
    pub checked: usize,
    pub alerted: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub renotify_interval: Duration,
    /// Upper bound on per-site pipelines running at once.
    pub max_concurrent_checks: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            renotify_interval: Duration::minutes(DEFAULT_RENOTIFY_INTERVAL_MINUTES),
            max_concurrent_checks: 8,
        }
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    store: Arc<dyn SiteStore>,
    prober: Arc<dyn SiteProbe>,
    sender: Arc<dyn NotificationSender>,
    settings: OrchestratorSettings,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn SiteStore>,
        prober: Arc<dyn SiteProbe>,
        sender: Arc<dyn NotificationSender>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            prober,
            sender,
            settings,
        }
    }

    /// Runs one full pass over all tracked sites.
    ///
    /// Only a failure to load the site list fails the cycle; every per-site
    /// error (including a panic inside the pipeline) is logged and counted.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let sites = self.store.list_all_sites_with_owners().await?;
        let mut report = CycleReport {
            total: sites.len(),
            ..Default::default()
        };

        if sites.is_empty() {
            debug!("No tracked sites; nothing to check.");
            return Ok(report);
        }

        let permits = Arc::new(Semaphore::new(
            self.settings
                .max_concurrent_checks
                .clamp(1, MAX_CONCURRENT_CHECKS),
        ));
        let mut tasks = JoinSet::new();

        for site in sites {
            let Some(chat_id) = site.owner_chat_id else {
                warn!(
                    site_id = site.id,
                    user_id = site.user_id,
                    url = %site.url,
                    "Site has no resolvable owner. Skipping."
                );
                report.skipped += 1;
                continue;
            };

            let this = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let site_id = site.id;
                let url = site.url.clone();
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (site_id, url, Err(SiteCheckError::NoPermit(e))),
                };
                (site_id, url, this.check_site(site, chat_id).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(alerted))) => {
                    report.checked += 1;
                    if alerted {
                        report.alerted += 1;
                    }
                }
                Ok((site_id, url, Err(e))) => {
                    if matches!(e, SiteCheckError::Notify(_)) {
                        report.checked += 1;
                    }
                    error!(site_id, url = %url, error = %e, "Site check failed.");
                    report.failed += 1;
                }
                Err(join_error) => {
                    error!(error = %join_error, "Site check task aborted.");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            checked = report.checked,
            alerted = report.alerted,
            failed = report.failed,
            skipped = report.skipped,
            "Monitoring cycle finished."
        );
        Ok(report)
    }

    /// Probe, decide, persist, notify. Returns whether an alert was delivered.
    async fn check_site(&self, site: TrackedSite, chat_id: i64) -> Result<bool, SiteCheckError> {
        let outcome = self.prober.probe(&site.url).await?;
        let now = Utc::now();
        let policy = decide(
            site.is_available,
            outcome.available,
            site.last_notified,
            now,
            self.settings.renotify_interval,
        );

        self.store
            .update_site_status(
                site.id,
                SiteStatusUpdate {
                    is_available: outcome.available,
                    checked_at: now,
                    notified_at: policy.last_notified,
                },
            )
            .await?;

        if site.is_available != outcome.available {
            info!(
                site_id = site.id,
                url = %site.url,
                available = outcome.available,
                detail = %outcome.detail,
                "Site availability changed."
            );
        }

        let Some(message) = AlertMessage::for_decision(
            policy.decision,
            site.is_available,
            &site.url,
            &outcome.detail,
        ) else {
            return Ok(false);
        };

        self.sender.send(chat_id, &message.render()).await?;
        info!(site_id = site.id, chat_id, kind = ?message.kind, "Alert delivered.");
        Ok(true)
    }
}

#[async_trait]
impl ScheduledJob for BatchOrchestrator {
    async fn run(&self) {
        if let Err(e) = self.run_cycle().await {
            error!(error = %e, "Monitoring cycle aborted.");
        }
    }
}
