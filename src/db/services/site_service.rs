use sqlx::PgPool;

use crate::db::entities::{SiteStatusUpdate, TrackedSite};
use crate::db::store::StoreError;

// LEFT JOIN keeps orphaned sites visible so the batch can report them.
const SELECT_TRACKED_SITES: &str = "
    SELECT s.id, s.url, s.user_id, u.telegram_id AS owner_chat_id,
           s.is_available, s.last_checked, s.last_notified
    FROM sites s
    LEFT JOIN users u ON u.id = s.user_id";

pub async fn list_all_sites_with_owners(pool: &PgPool) -> Result<Vec<TrackedSite>, StoreError> {
    let sql = format!("{SELECT_TRACKED_SITES} ORDER BY s.id");
    let sites = sqlx::query_as::<_, TrackedSite>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(sites)
}

pub async fn get_site_by_id(pool: &PgPool, site_id: i32) -> Result<Option<TrackedSite>, StoreError> {
    let sql = format!("{SELECT_TRACKED_SITES} WHERE s.id = $1");
    let site = sqlx::query_as::<_, TrackedSite>(&sql)
        .bind(site_id)
        .fetch_optional(pool)
        .await?;
    Ok(site)
}

/// Single-row update; the three columns change together or not at all.
pub async fn update_site_status(
    pool: &PgPool,
    site_id: i32,
    update: SiteStatusUpdate,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE sites SET is_available = $1, last_checked = $2, last_notified = $3 WHERE id = $4",
    )
    .bind(update.is_available)
    .bind(update.checked_at)
    .bind(update.notified_at)
    .bind(site_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::SiteNotFound(site_id));
    }
    Ok(())
}
