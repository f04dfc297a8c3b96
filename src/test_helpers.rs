//! In-memory doubles for the store, prober, sender and scheduled job.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::entities::{SiteStatusUpdate, TrackedSite};
use crate::db::{SiteStore, StoreError};
use crate::monitoring::probe::{ProbeError, ProbeOutcome, SiteProbe};
use crate::monitoring::scheduler::ScheduledJob;
use crate::notifications::{NotificationSender, SenderError};

/// A site owned by `chat_id`, currently up and never checked.
pub fn tracked_site(id: i32, url: &str, chat_id: i64) -> TrackedSite {
    TrackedSite {
        id,
        url: url.to_string(),
        user_id: id * 10,
        owner_chat_id: Some(chat_id),
        is_available: true,
        last_checked: None,
        last_notified: None,
    }
}

#[derive(Default)]
pub struct InMemorySiteStore {
    sites: Mutex<BTreeMap<i32, TrackedSite>>,
    settings: Mutex<HashMap<String, i64>>,
    failing_updates: Mutex<HashSet<i32>>,
    updates: Mutex<Vec<(i32, SiteStatusUpdate)>>,
    fail_listing: Mutex<bool>,
    fail_setting_reads: Mutex<bool>,
}

impl InMemorySiteStore {
    pub fn with_sites(sites: impl IntoIterator<Item = TrackedSite>) -> Self {
        let store = Self::default();
        for site in sites {
            store.insert_site(site);
        }
        store
    }

    pub fn insert_site(&self, site: TrackedSite) {
        self.sites.lock().unwrap().insert(site.id, site);
    }

    pub fn site(&self, site_id: i32) -> Option<TrackedSite> {
        self.sites.lock().unwrap().get(&site_id).cloned()
    }

    /// Every status write, in the order it happened.
    pub fn updates(&self) -> Vec<(i32, SiteStatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn set_setting(&self, key: &str, value: i64) {
        self.settings.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn remove_setting(&self, key: &str) {
        self.settings.lock().unwrap().remove(key);
    }

    pub fn setting(&self, key: &str) -> Option<i64> {
        self.settings.lock().unwrap().get(key).copied()
    }

    pub fn fail_updates_for(&self, site_id: i32) {
        self.failing_updates.lock().unwrap().insert(site_id);
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.fail_listing.lock().unwrap() = fail;
    }

    pub fn fail_setting_reads(&self, fail: bool) {
        *self.fail_setting_reads.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SiteStore for InMemorySiteStore {
    async fn list_all_sites_with_owners(&self) -> Result<Vec<TrackedSite>, StoreError> {
        if *self.fail_listing.lock().unwrap() {
            return Err(StoreError::Unavailable("listing disabled".to_string()));
        }
        Ok(self.sites.lock().unwrap().values().cloned().collect())
    }

    async fn get_site(&self, site_id: i32) -> Result<Option<TrackedSite>, StoreError> {
        Ok(self.site(site_id))
    }

    async fn update_site_status(
        &self,
        site_id: i32,
        update: SiteStatusUpdate,
    ) -> Result<(), StoreError> {
        if self.failing_updates.lock().unwrap().contains(&site_id) {
            return Err(StoreError::Unavailable(format!("write to site {site_id} rejected")));
        }
        let mut sites = self.sites.lock().unwrap();
        let site = sites
            .get_mut(&site_id)
            .ok_or(StoreError::SiteNotFound(site_id))?;
        site.is_available = update.is_available;
        site.last_checked = Some(update.checked_at);
        site.last_notified = update.notified_at;
        self.updates.lock().unwrap().push((site_id, update));
        Ok(())
    }

    async fn read_setting(&self, key: &str) -> Result<Option<i64>, StoreError> {
        if *self.fail_setting_reads.lock().unwrap() {
            return Err(StoreError::Unavailable("settings disabled".to_string()));
        }
        Ok(self.setting(key))
    }

    async fn write_setting(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.set_setting(key, value);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedProbe {
    Up,
    Down,
    /// Returns a `ProbeError`.
    Fail,
    Panic,
}

/// Prober answering from a per-URL script. Unscripted URLs are up.
#[derive(Default)]
pub struct ScriptedProber {
    script: Mutex<HashMap<String, ScriptedProbe>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn set(&self, url: &str, probe: ScriptedProbe) {
        self.script.lock().unwrap().insert(url.to_string(), probe);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteProbe for ScriptedProber {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, ProbeError> {
        self.calls.lock().unwrap().push(url.to_string());
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(ScriptedProbe::Up);
        match scripted {
            ScriptedProbe::Up => Ok(ProbeOutcome {
                available: true,
                attempts: 1,
                status: Some(200),
                detail: "200 OK".to_string(),
            }),
            ScriptedProbe::Down => Ok(ProbeOutcome {
                available: false,
                attempts: 2,
                status: None,
                detail: "Error: Connection failed".to_string(),
            }),
            ScriptedProbe::Fail => Err(ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            }),
            ScriptedProbe::Panic => panic!("scripted probe panic for {url}"),
        }
    }
}

/// Records every message; fails for chosen chat ids.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(i64, String)>>,
    failing_chats: Mutex<HashSet<i64>>,
}

impl RecordingSender {
    pub fn fail_for(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), SenderError> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(SenderError::SendFailed(format!("chat {chat_id} unreachable")));
        }
        self.sent.lock().unwrap().push((chat_id, message.to_string()));
        Ok(())
    }
}

/// Counts runs; optionally holds each run open for `duration`.
#[derive(Default)]
pub struct CountingJob {
    started: AtomicUsize,
    finished: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    duration: Option<Duration>,
}

impl CountingJob {
    pub fn lasting(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Default::default()
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed in flight at once.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduledJob for CountingJob {
    async fn run(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        if let Some(duration) = self.duration {
            tokio::time::sleep(duration).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}
