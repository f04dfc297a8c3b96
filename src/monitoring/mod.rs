pub mod orchestrator;
pub mod policy;
pub mod probe;
pub mod scheduler;

pub use orchestrator::{BatchOrchestrator, CycleError, CycleReport, OrchestratorSettings};
pub use policy::{decide, NotificationDecision, PolicyOutcome};
pub use probe::{ProbeOutcome, ProbePolicy, Prober, SiteProbe};
pub use scheduler::{ReconcileOutcome, ScheduleController, ScheduleState, ScheduledJob, SchedulerSettings};
