//! Owns the recurring `site_check` trigger and keeps its period in sync with
//! the persisted `check_interval_minutes` setting.
//!
//! Two independent timers run once the controller is started:
//!
//! * the monitoring trigger, which fires the registered [`ScheduledJob`]
//!   every installed interval;
//! * the reconciliation timer, which re-reads the setting (every 30 seconds by
//!   default) and reschedules the trigger in place when it changed.
//!
//! The installed interval lives in a `watch` channel owned by the controller.
//! Rescheduling only moves the trigger's next deadline; jobs already running
//! are tracked separately and are never cancelled or restarted by it.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::db::{SiteStore, CHECK_INTERVAL_KEY};

pub const JOB_NAME: &str = "site_check";
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_RECONCILE_PERIOD: Duration = Duration::from_secs(30);
pub const MIN_INTERVAL_MINUTES: i64 = 1;
/// One week.
pub const MAX_INTERVAL_MINUTES: i64 = 10_080;

/// Work fired by the monitoring trigger.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Uninstalled,
    Installed { interval_minutes: u64 },
}

impl ScheduleState {
    pub fn interval_minutes(&self) -> Option<u64> {
        match self {
            ScheduleState::Uninstalled => None,
            ScheduleState::Installed { interval_minutes } => Some(*interval_minutes),
        }
    }
}

/// What a single reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Rescheduled { from: u64, to: u64 },
    /// Persisted value out of bounds; the installed interval was kept.
    Rejected { value: i64 },
    /// Setting absent from the store; the installed interval was kept.
    Missing,
    ReadFailed,
    NotInstalled,
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid default check interval: {0} minutes")]
    InvalidDefaultInterval(u64),
    #[error("Reconcile period must be greater than zero")]
    InvalidReconcilePeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Used when the setting is absent, invalid or unreadable at startup.
    pub default_interval_minutes: u64,
    pub reconcile_period: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            reconcile_period: DEFAULT_RECONCILE_PERIOD,
        }
    }
}

/// Returns the interval in minutes if `value` is within bounds.
pub fn validate_interval(value: i64) -> Option<u64> {
    if (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&value) {
        u64::try_from(value).ok()
    } else {
        None
    }
}

fn interval_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

struct Shared {
    store: Arc<dyn SiteStore>,
    job: Arc<dyn ScheduledJob>,
    settings: SchedulerSettings,
    schedule_tx: watch::Sender<ScheduleState>,
}

impl Shared {
    /// Interval to install at startup. Seeds the store when the setting is absent.
    async fn initial_interval(&self) -> u64 {
        let default = self.settings.default_interval_minutes;
        match self.store.read_setting(CHECK_INTERVAL_KEY).await {
            Ok(Some(value)) => match validate_interval(value) {
                Some(minutes) => {
                    info!(interval_minutes = minutes, source = "database", "Loaded check interval.");
                    minutes
                }
                None => {
                    warn!(
                        value,
                        fallback = default,
                        "Persisted check interval is invalid. Using default."
                    );
                    default
                }
            },
            Ok(None) => {
                info!(interval_minutes = default, source = "default", "Check interval not set. Using default.");
                if let Err(e) = self.store.write_setting(CHECK_INTERVAL_KEY, default as i64).await {
                    warn!(error = %e, "Failed to persist default check interval.");
                }
                default
            }
            Err(e) => {
                error!(error = %e, fallback = default, "Failed to read check interval. Using default.");
                default
            }
        }
    }

    async fn reconcile(&self) -> ReconcileOutcome {
        let installed = self.schedule_tx.borrow().interval_minutes();
        let Some(current) = installed else {
            return ReconcileOutcome::NotInstalled;
        };

        let persisted = match self.store.read_setting(CHECK_INTERVAL_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(interval_minutes = current, "Check interval not set. Keeping installed value.");
                return ReconcileOutcome::Missing;
            }
            Err(e) => {
                warn!(error = %e, interval_minutes = current, "Failed to read check interval. Keeping installed value.");
                return ReconcileOutcome::ReadFailed;
            }
        };

        let Some(requested) = validate_interval(persisted) else {
            warn!(
                value = persisted,
                interval_minutes = current,
                "Ignoring invalid check interval. Keeping installed value."
            );
            return ReconcileOutcome::Rejected { value: persisted };
        };

        if requested == current {
            debug!(interval_minutes = current, "Check interval unchanged.");
            return ReconcileOutcome::Unchanged;
        }

        // Only an installed schedule may be moved; a concurrent shutdown wins.
        let rescheduled = self.schedule_tx.send_if_modified(|state| match state {
            ScheduleState::Installed { interval_minutes } if *interval_minutes != requested => {
                *interval_minutes = requested;
                true
            }
            _ => false,
        });
        if !rescheduled {
            return ReconcileOutcome::NotInstalled;
        }

        info!(job = JOB_NAME, from = current, to = requested, "Rescheduled monitoring job.");
        ReconcileOutcome::Rescheduled {
            from: current,
            to: requested,
        }
    }
}

pub struct ScheduleController {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    trigger_task: Option<JoinHandle<()>>,
    reconcile_task: Option<JoinHandle<()>>,
}

impl ScheduleController {
    /// Creates an uninstalled controller for `job`.
    pub fn new(
        store: Arc<dyn SiteStore>,
        job: Arc<dyn ScheduledJob>,
        settings: SchedulerSettings,
    ) -> Result<Self, ScheduleError> {
        let default = settings.default_interval_minutes;
        if i64::try_from(default).ok().and_then(validate_interval).is_none() {
            return Err(ScheduleError::InvalidDefaultInterval(default));
        }
        if settings.reconcile_period.is_zero() {
            return Err(ScheduleError::InvalidReconcilePeriod);
        }

        let (schedule_tx, _) = watch::channel(ScheduleState::Uninstalled);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                job,
                settings,
                schedule_tx,
            }),
            shutdown_tx,
            trigger_task: None,
            reconcile_task: None,
        })
    }

    pub fn state(&self) -> ScheduleState {
        *self.shared.schedule_tx.borrow()
    }

    /// Installs the monitoring trigger and starts reconciliation.
    /// Returns the installed interval; calling it again is a no-op.
    pub async fn start(&mut self) -> u64 {
        if let Some(minutes) = self.state().interval_minutes() {
            return minutes;
        }

        let interval_minutes = self.shared.initial_interval().await;
        self.shared
            .schedule_tx
            .send_replace(ScheduleState::Installed { interval_minutes });

        let schedule_rx = self.shared.schedule_tx.subscribe();
        self.trigger_task = Some(tokio::spawn(run_trigger_loop(
            self.shared.clone(),
            schedule_rx,
            self.shutdown_tx.subscribe(),
        )));
        self.reconcile_task = Some(tokio::spawn(run_reconcile_loop(
            self.shared.clone(),
            self.shutdown_tx.subscribe(),
        )));

        info!(
            job = JOB_NAME,
            interval_minutes,
            reconcile_period_secs = self.shared.settings.reconcile_period.as_secs(),
            "Schedule controller started."
        );
        interval_minutes
    }

    /// Runs one reconciliation pass immediately.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        self.shared.reconcile().await
    }

    /// Cancels both timers. Jobs already running are awaited, not aborted.
    pub async fn shutdown(&mut self) {
        self.shutdown_tx.send_replace(true);
        for task in [self.reconcile_task.take(), self.trigger_task.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = task.await {
                error!(error = %e, "Scheduler task ended abnormally.");
            }
        }
        self.shared.schedule_tx.send_replace(ScheduleState::Uninstalled);
        info!(job = JOB_NAME, "Schedule controller stopped.");
    }
}

async fn run_trigger_loop(
    shared: Arc<Shared>,
    mut schedule_rx: watch::Receiver<ScheduleState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let installed = schedule_rx.borrow_and_update().interval_minutes();
    let Some(mut interval_minutes) = installed else {
        return;
    };
    let mut last_fire = Instant::now();
    let mut in_flight = JoinSet::new();

    loop {
        // An overdue deadline after shortening the interval fires right away.
        let next_fire = last_fire + interval_duration(interval_minutes);
        tokio::select! {
            _ = sleep_until(next_fire) => {
                last_fire = Instant::now();
                while let Some(finished) = in_flight.try_join_next() {
                    if let Err(e) = finished {
                        error!(job = JOB_NAME, error = %e, "Monitoring job ended abnormally.");
                    }
                }
                if !in_flight.is_empty() {
                    warn!(job = JOB_NAME, running = in_flight.len(), "Previous monitoring cycle still running.");
                }
                let job = shared.job.clone();
                in_flight.spawn(async move { job.run().await });
                debug!(job = JOB_NAME, interval_minutes, "Monitoring trigger fired.");
            }
            changed = schedule_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let installed = schedule_rx.borrow_and_update().interval_minutes();
                match installed {
                    Some(minutes) => interval_minutes = minutes,
                    None => break,
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        if let Err(e) = finished {
            error!(job = JOB_NAME, error = %e, "Monitoring job ended abnormally.");
        }
    }
    debug!(job = JOB_NAME, "Monitoring trigger stopped.");
}

async fn run_reconcile_loop(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.settings.reconcile_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate and start() has just read the setting.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                shared.reconcile().await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }
    debug!("Interval reconciliation stopped.");
}
