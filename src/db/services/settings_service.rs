use chrono::Utc;
use sqlx::PgPool;

use crate::db::entities::setting;
use crate::db::store::StoreError;

// --- Settings Service Functions ---

/// Retrieves a setting by its key.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<setting::Model>, StoreError> {
    let setting = sqlx::query_as::<_, setting::Model>(
        "SELECT key, value, updated_at FROM system_settings WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;
    Ok(setting)
}

/// Creates or updates a setting.
pub async fn update_setting(
    pool: &PgPool,
    key: &str,
    value: &serde_json::Value,
) -> Result<setting::Model, StoreError> {
    let setting = sqlx::query_as::<_, setting::Model>(
        "INSERT INTO system_settings (key, value, updated_at) VALUES ($1, $2, $3)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
         RETURNING key, value, updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(setting)
}
