use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored site joined with the Telegram chat of its owner.
///
/// `owner_chat_id` is `None` when the owning user row is missing, which the
/// batch treats as a data-integrity problem and skips.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackedSite {
    pub id: i32,
    pub url: String,
    pub user_id: i32,
    pub owner_chat_id: Option<i64>,
    pub is_available: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_notified: Option<DateTime<Utc>>,
}

/// The three state columns written after each probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteStatusUpdate {
    pub is_available: bool,
    pub checked_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}
