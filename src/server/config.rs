use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::monitoring::orchestrator::{OrchestratorSettings, MAX_CONCURRENT_CHECKS};
use crate::monitoring::probe::{ProbePolicy, DEFAULT_USER_AGENT};
use crate::monitoring::scheduler::{validate_interval, SchedulerSettings, MAX_INTERVAL_MINUTES};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// Alerts are only logged when unset.
    pub telegram_bot_token: Option<String>,
    pub default_check_interval_minutes: u64,
    pub reconcile_period_seconds: u64,
    pub renotify_interval_minutes: u64,
    pub probe_timeout_seconds: u64,
    pub probe_max_attempts: u32,
    pub probe_attempt_delay_ms: u64,
    pub probe_user_agent: String,
    pub max_concurrent_checks: usize,
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialMonitorConfig {
    database_url: Option<String>,
    database_max_connections: Option<u32>,
    telegram_bot_token: Option<String>,
    default_check_interval_minutes: Option<u64>,
    reconcile_period_seconds: Option<u64>,
    renotify_interval_minutes: Option<u64>,
    probe_timeout_seconds: Option<u64>,
    probe_max_attempts: Option<u32>,
    probe_attempt_delay_ms: Option<u64>,
    probe_user_agent: Option<String>,
    max_concurrent_checks: Option<usize>,
    log_dir: Option<String>,
}

impl PartialMonitorConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }
}

impl MonitorConfig {
    /// Loads defaults, then the TOML file (if any), then environment
    /// variables; later layers win.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialMonitorConfig::from_file(Path::new(path))?,
            None => PartialMonitorConfig::default(),
        };
        let env_config: PartialMonitorConfig = envy::from_env()?;

        Self::merge(file_config, env_config)
    }

    /// Merges two layers, `overrides` winning, and validates the result.
    pub fn merge(
        base: PartialMonitorConfig,
        overrides: PartialMonitorConfig,
    ) -> Result<Self, ConfigError> {
        let config = MonitorConfig {
            database_url: overrides
                .database_url
                .or(base.database_url)
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: overrides
                .database_max_connections
                .or(base.database_max_connections)
                .unwrap_or(10),
            telegram_bot_token: overrides
                .telegram_bot_token
                .or(base.telegram_bot_token)
                .filter(|token| !token.trim().is_empty()),
            default_check_interval_minutes: overrides
                .default_check_interval_minutes
                .or(base.default_check_interval_minutes)
                .unwrap_or(5),
            reconcile_period_seconds: overrides
                .reconcile_period_seconds
                .or(base.reconcile_period_seconds)
                .unwrap_or(30),
            renotify_interval_minutes: overrides
                .renotify_interval_minutes
                .or(base.renotify_interval_minutes)
                .unwrap_or(15),
            probe_timeout_seconds: overrides
                .probe_timeout_seconds
                .or(base.probe_timeout_seconds)
                .unwrap_or(10),
            probe_max_attempts: overrides
                .probe_max_attempts
                .or(base.probe_max_attempts)
                .unwrap_or(2),
            probe_attempt_delay_ms: overrides
                .probe_attempt_delay_ms
                .or(base.probe_attempt_delay_ms)
                .unwrap_or(1000),
            probe_user_agent: overrides
                .probe_user_agent
                .or(base.probe_user_agent)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_concurrent_checks: overrides
                .max_concurrent_checks
                .or(base.max_concurrent_checks)
                .unwrap_or(8),
            log_dir: overrides
                .log_dir
                .or(base.log_dir)
                .unwrap_or_else(|| "logs".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let default_interval = i64::try_from(self.default_check_interval_minutes).ok();
        if default_interval.and_then(validate_interval).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default_check_interval_minutes must be between 1 and 10080, got {}",
                self.default_check_interval_minutes
            )));
        }
        if self.renotify_interval_minutes > MAX_INTERVAL_MINUTES as u64 {
            return Err(ConfigError::Invalid(format!(
                "renotify_interval_minutes must be at most 10080, got {}",
                self.renotify_interval_minutes
            )));
        }
        if self.max_concurrent_checks > MAX_CONCURRENT_CHECKS {
            return Err(ConfigError::Invalid(format!(
                "max_concurrent_checks must be at most {MAX_CONCURRENT_CHECKS}, got {}",
                self.max_concurrent_checks
            )));
        }
        let positive = [
            ("database_max_connections", u64::from(self.database_max_connections)),
            ("reconcile_period_seconds", self.reconcile_period_seconds),
            ("renotify_interval_minutes", self.renotify_interval_minutes),
            ("probe_timeout_seconds", self.probe_timeout_seconds),
            ("probe_max_attempts", u64::from(self.probe_max_attempts)),
            ("max_concurrent_checks", self.max_concurrent_checks as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            timeout: Duration::from_secs(self.probe_timeout_seconds),
            max_attempts: self.probe_max_attempts,
            attempt_delay: Duration::from_millis(self.probe_attempt_delay_ms),
            user_agent: self.probe_user_agent.clone(),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            renotify_interval: chrono::Duration::minutes(self.renotify_interval_minutes as i64),
            max_concurrent_checks: self.max_concurrent_checks,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            default_interval_minutes: self.default_check_interval_minutes,
            reconcile_period: Duration::from_secs(self.reconcile_period_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn partial(toml_text: &str) -> PartialMonitorConfig {
        PartialMonitorConfig::from_toml_str(toml_text, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let config = MonitorConfig::merge(
            partial(r#"database_url = "postgres://localhost/sites""#),
            PartialMonitorConfig::default(),
        )
        .unwrap();

        assert_eq!(config.default_check_interval_minutes, 5);
        assert_eq!(config.reconcile_period_seconds, 30);
        assert_eq!(config.renotify_interval_minutes, 15);
        assert_eq!(config.probe_max_attempts, 2);
        assert_eq!(config.probe_user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.telegram_bot_token, None);
        assert_eq!(config.probe_policy().attempt_delay, Duration::from_secs(1));
        assert_eq!(
            config.orchestrator_settings().renotify_interval,
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn test_overrides_win() {
        let base = partial(
            r#"
            database_url = "postgres://file/sites"
            default_check_interval_minutes = 10
            probe_max_attempts = 3
            "#,
        );
        let overrides = partial(
            r#"
            database_url = "postgres://env/sites"
            probe_max_attempts = 4
            telegram_bot_token = "123:abc"
            "#,
        );
        let config = MonitorConfig::merge(base, overrides).unwrap();

        assert_eq!(config.database_url, "postgres://env/sites");
        assert_eq!(config.default_check_interval_minutes, 10);
        assert_eq!(config.probe_max_attempts, 4);
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.scheduler_settings().default_interval_minutes, 10);
    }

    #[test]
    fn test_missing_database_url() {
        let result = MonitorConfig::merge(PartialMonitorConfig::default(), PartialMonitorConfig::default());
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_rejects_zero_values() {
        let result = MonitorConfig::merge(
            partial(
                r#"
                database_url = "postgres://localhost/sites"
                default_check_interval_minutes = 0
                "#,
            ),
            PartialMonitorConfig::default(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = MonitorConfig::merge(
            partial(
                r#"
                database_url = "postgres://localhost/sites"
                probe_max_attempts = 0
                "#,
            ),
            PartialMonitorConfig::default(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(ref m)) if m.contains("probe_max_attempts")));
    }

    #[test]
    fn test_rejects_oversized_limits() {
        let result = MonitorConfig::merge(
            partial(
                r#"
                database_url = "postgres://localhost/sites"
                max_concurrent_checks = 1000000000
                "#,
            ),
            PartialMonitorConfig::default(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(ref m)) if m.contains("max_concurrent_checks")));

        let result = MonitorConfig::merge(
            partial(
                r#"
                database_url = "postgres://localhost/sites"
                max_concurrent_checks = 1024
                "#,
            ),
            PartialMonitorConfig::default(),
        );
        assert_eq!(result.unwrap().max_concurrent_checks, MAX_CONCURRENT_CHECKS);
    }

    #[test]
    fn test_blank_token_means_no_telegram() {
        let config = MonitorConfig::merge(
            partial(
                r#"
                database_url = "postgres://localhost/sites"
                telegram_bot_token = "   "
                "#,
            ),
            PartialMonitorConfig::default(),
        )
        .unwrap();
        assert_eq!(config.telegram_bot_token, None);
    }

    #[test]
    fn test_reads_file_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_url = \"postgres://file/sites\"").unwrap();
        writeln!(file, "max_concurrent_checks = 16").unwrap();

        let layer = PartialMonitorConfig::from_file(file.path()).unwrap();
        let config = MonitorConfig::merge(layer, PartialMonitorConfig::default()).unwrap();
        assert_eq!(config.max_concurrent_checks, 16);

        let missing = PartialMonitorConfig::from_file(Path::new("/nonexistent/sitewatch.toml")).unwrap();
        assert!(missing.database_url.is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let result = PartialMonitorConfig::from_toml_str("probe_max_attempts = \"many\"", Path::new("bad.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
