//! PostgreSQL-backed implementation of [`SiteStore`].

pub mod settings_service;
pub mod site_service;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::entities::{SiteStatusUpdate, TrackedSite};
use crate::db::store::{SiteStore, StoreError};

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        telegram_id BIGINT NOT NULL UNIQUE,
        username TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sites (
        id SERIAL PRIMARY KEY,
        url TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        is_available BOOLEAN NOT NULL DEFAULT TRUE,
        last_checked TIMESTAMPTZ,
        last_notified TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_sites_user_id ON sites (user_id)",
    "CREATE TABLE IF NOT EXISTS system_settings (
        key TEXT PRIMARY KEY,
        value JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

/// Shares one connection pool across all concurrent callers.
#[derive(Clone)]
pub struct PgSiteStore {
    pool: PgPool,
}

impl PgSiteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the tables this crate reads from if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SiteStore for PgSiteStore {
    async fn list_all_sites_with_owners(&self) -> Result<Vec<TrackedSite>, StoreError> {
        site_service::list_all_sites_with_owners(&self.pool).await
    }

    async fn get_site(&self, site_id: i32) -> Result<Option<TrackedSite>, StoreError> {
        site_service::get_site_by_id(&self.pool, site_id).await
    }

    async fn update_site_status(
        &self,
        site_id: i32,
        update: SiteStatusUpdate,
    ) -> Result<(), StoreError> {
        site_service::update_site_status(&self.pool, site_id, update).await
    }

    async fn read_setting(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let Some(setting) = settings_service::get_setting(&self.pool, key).await? else {
            return Ok(None);
        };
        match setting.as_i64() {
            Some(value) => Ok(Some(value)),
            None => Err(StoreError::InvalidSetting {
                key: setting.key,
                value: setting.value.to_string(),
            }),
        }
    }

    async fn write_setting(&self, key: &str, value: i64) -> Result<(), StoreError> {
        settings_service::update_setting(&self.pool, key, &serde_json::Value::from(value)).await?;
        Ok(())
    }
}
