//! Alert throttling: decides whether a probe result warrants a message.
use chrono::{DateTime, Duration, Utc};

/// Default cool-down between repeated outage alerts for the same site.
pub const DEFAULT_RENOTIFY_INTERVAL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    NoOp,
    AlertDown,
    AlertRecovered,
}

impl NotificationDecision {
    pub fn is_alert(self) -> bool {
        !matches!(self, NotificationDecision::NoOp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub decision: NotificationDecision,
    /// Value to persist as the site's `last_notified`.
    pub last_notified: Option<DateTime<Utc>>,
}

/// Applies the alerting rules in priority order:
///
/// 1. up → down alerts immediately.
/// 2. still down alerts again once `renotify_interval` has elapsed since the
///    last alert, or if no alert was ever recorded for this outage.
/// 3. down → up sends a recovery alert and clears `last_notified`.
/// 4. anything else keeps `last_notified` untouched.
pub fn decide(
    previously_available: bool,
    currently_available: bool,
    last_notified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    renotify_interval: Duration,
) -> PolicyOutcome {
    if previously_available && !currently_available {
        return PolicyOutcome {
            decision: NotificationDecision::AlertDown,
            last_notified: Some(now),
        };
    }

    if !currently_available {
        let cooled_down = match last_notified {
            None => true,
            Some(last) => now - last > renotify_interval,
        };
        if cooled_down {
            return PolicyOutcome {
                decision: NotificationDecision::AlertDown,
                last_notified: Some(now),
            };
        }
    }

    if currently_available && !previously_available {
        return PolicyOutcome {
            decision: NotificationDecision::AlertRecovered,
            last_notified: None,
        };
    }

    PolicyOutcome {
        decision: NotificationDecision::NoOp,
        last_notified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn renotify() -> Duration {
        Duration::minutes(DEFAULT_RENOTIFY_INTERVAL_MINUTES)
    }

    #[test]
    fn test_first_outage_always_alerts() {
        let priors = [
            None,
            Some(now() - Duration::minutes(1)),
            Some(now() - Duration::hours(3)),
        ];
        for last in priors {
            let outcome = decide(true, false, last, now(), renotify());
            assert_eq!(outcome.decision, NotificationDecision::AlertDown);
            assert_eq!(outcome.last_notified, Some(now()));
        }
    }

    #[test]
    fn test_still_down_after_cooldown_realerts() {
        let outcome = decide(false, false, Some(now() - Duration::minutes(20)), now(), renotify());
        assert_eq!(outcome.decision, NotificationDecision::AlertDown);
        assert_eq!(outcome.last_notified, Some(now()));
    }

    #[test]
    fn test_still_down_inside_cooldown_is_quiet() {
        let last = Some(now() - Duration::minutes(5));
        let outcome = decide(false, false, last, now(), renotify());
        assert_eq!(outcome.decision, NotificationDecision::NoOp);
        assert_eq!(outcome.last_notified, last);
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let last = Some(now() - renotify());
        let outcome = decide(false, false, last, now(), renotify());
        assert_eq!(outcome.decision, NotificationDecision::NoOp);
        assert_eq!(outcome.last_notified, last);
    }

    #[test]
    fn test_still_down_without_record_alerts() {
        let outcome = decide(false, false, None, now(), renotify());
        assert_eq!(outcome.decision, NotificationDecision::AlertDown);
        assert_eq!(outcome.last_notified, Some(now()));
    }

    #[test]
    fn test_recovery_clears_last_notified() {
        for last in [None, Some(now() - Duration::minutes(2))] {
            let outcome = decide(false, true, last, now(), renotify());
            assert_eq!(outcome.decision, NotificationDecision::AlertRecovered);
            assert_eq!(outcome.last_notified, None);
        }
    }

    #[test]
    fn test_steady_up_is_noop() {
        let outcome = decide(true, true, None, now(), renotify());
        assert_eq!(outcome.decision, NotificationDecision::NoOp);
        assert_eq!(outcome.last_notified, None);
    }

    #[test]
    fn test_decide_is_idempotent() {
        let cases = [
            (true, false, None),
            (false, false, Some(now() - Duration::minutes(5))),
            (false, false, Some(now() - Duration::minutes(30))),
            (false, true, Some(now() - Duration::minutes(30))),
            (true, true, None),
        ];
        for (prev, curr, last) in cases {
            let first = decide(prev, curr, last, now(), renotify());
            let second = decide(prev, curr, last, now(), renotify());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_flapping_site_alert_count() {
        // down, down (5m), down (20m), up: first alert, quiet, re-alert, recovery.
        let t0 = now();
        let mut available = true;
        let mut last_notified = None;
        let mut alerts = Vec::new();
        for (offset, observed) in [(0, false), (5, false), (20, false), (21, true)] {
            let at = t0 + Duration::minutes(offset);
            let outcome = decide(available, observed, last_notified, at, renotify());
            if outcome.decision.is_alert() {
                alerts.push(outcome.decision);
            }
            available = observed;
            last_notified = outcome.last_notified;
        }
        assert_eq!(
            alerts,
            vec![
                NotificationDecision::AlertDown,
                NotificationDecision::AlertDown,
                NotificationDecision::AlertRecovered,
            ]
        );
        assert_eq!(last_notified, None);
    }
}
