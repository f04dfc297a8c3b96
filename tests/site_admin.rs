use std::sync::Arc;

use chrono::{Duration, Utc};
use sitewatch::db::CHECK_INTERVAL_KEY;
use sitewatch::monitoring::{
    BatchOrchestrator, OrchestratorSettings, ReconcileOutcome, ScheduleController,
    ScheduleState, SchedulerSettings,
};
use sitewatch::services::{AdminError, SiteAdminService};
use sitewatch::test_helpers::{
    tracked_site, CountingJob, InMemorySiteStore, RecordingSender, ScriptedProbe,
    ScriptedProber,
};

const URL: &str = "https://shop.example.com";

fn service(store: &Arc<InMemorySiteStore>, prober: &Arc<ScriptedProber>) -> SiteAdminService {
    SiteAdminService::new(store.clone(), prober.clone())
}

#[tokio::test]
async fn refresh_one_stores_outage_and_keeps_throttle() {
    let mut site = tracked_site(1, URL, 101);
    let alerted_at = Utc::now() - Duration::minutes(3);
    site.last_notified = Some(alerted_at);
    let store = Arc::new(InMemorySiteStore::with_sites([site]));
    let prober = Arc::new(ScriptedProber::default());
    prober.set(URL, ScriptedProbe::Down);

    let outcome = service(&store, &prober).refresh_one(1).await.unwrap();

    assert!(!outcome.available);
    let stored = store.site(1).unwrap();
    assert!(!stored.is_available);
    assert!(stored.last_checked.is_some());
    assert_eq!(stored.last_notified, Some(alerted_at));
}

#[tokio::test]
async fn refresh_one_clears_throttle_when_up() {
    let mut site = tracked_site(1, URL, 101);
    site.is_available = false;
    site.last_notified = Some(Utc::now() - Duration::minutes(3));
    let store = Arc::new(InMemorySiteStore::with_sites([site]));
    let prober = Arc::new(ScriptedProber::default());

    let outcome = service(&store, &prober).refresh_one(1).await.unwrap();

    assert!(outcome.available);
    let stored = store.site(1).unwrap();
    assert!(stored.is_available);
    assert_eq!(stored.last_notified, None);
}

#[tokio::test]
async fn refresh_one_absorbs_pending_recovery_alert() {
    let mut site = tracked_site(1, URL, 101);
    site.is_available = false;
    site.last_notified = Some(Utc::now() - Duration::minutes(3));
    let store = Arc::new(InMemorySiteStore::with_sites([site]));
    let prober = Arc::new(ScriptedProber::default());
    let sender = Arc::new(RecordingSender::default());
    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        prober.clone(),
        sender.clone(),
        OrchestratorSettings::default(),
    );

    service(&store, &prober).refresh_one(1).await.unwrap();
    let report = orchestrator.run_cycle().await.unwrap();

    assert_eq!(report.alerted, 0);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn refresh_one_unknown_site() {
    let store = Arc::new(InMemorySiteStore::default());
    let prober = Arc::new(ScriptedProber::default());

    let result = service(&store, &prober).refresh_one(42).await;

    assert!(matches!(result, Err(AdminError::SiteNotFound(42))));
    assert!(prober.calls().is_empty());
}

#[tokio::test]
async fn refresh_one_probe_error_leaves_site_untouched() {
    let store = Arc::new(InMemorySiteStore::with_sites([tracked_site(1, URL, 101)]));
    let prober = Arc::new(ScriptedProber::default());
    prober.set(URL, ScriptedProbe::Fail);

    let result = service(&store, &prober).refresh_one(1).await;

    assert!(matches!(result, Err(AdminError::Probe(_))));
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn set_check_interval_validates_bounds() {
    let store = Arc::new(InMemorySiteStore::default());
    let admin = service(&store, &Arc::new(ScriptedProber::default()));

    for bad in [0, -1, 10_081] {
        assert!(matches!(
            admin.set_check_interval(bad).await,
            Err(AdminError::InvalidInterval(v)) if v == bad
        ));
    }
    assert_eq!(admin.check_interval().await.unwrap(), None);

    admin.set_check_interval(15).await.unwrap();
    assert_eq!(admin.check_interval().await.unwrap(), Some(15));
    assert_eq!(store.setting(CHECK_INTERVAL_KEY), Some(15));
}

#[tokio::test(start_paused = true)]
async fn new_interval_reaches_running_schedule() {
    let store = Arc::new(InMemorySiteStore::default());
    let admin = service(&store, &Arc::new(ScriptedProber::default()));
    let mut controller = ScheduleController::new(
        store.clone(),
        Arc::new(CountingJob::default()),
        SchedulerSettings::default(),
    )
    .unwrap();
    assert_eq!(controller.start().await, 5);

    admin.set_check_interval(30).await.unwrap();
    assert_eq!(
        controller.reconcile().await,
        ReconcileOutcome::Rescheduled { from: 5, to: 30 }
    );
    assert_eq!(controller.state(), ScheduleState::Installed { interval_minutes: 30 });

    controller.shutdown().await;
}
