//! Layered configuration for the durable-state subsystem.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment variables prefixed `JOBVAULT_` with nested keys separated by
//! `__` (for example `JOBVAULT_TRANSACTION__MAX_RETRIES=3`).

use crate::job::services::{HousekeepingPolicy, RetryPolicy};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error raised when configuration cannot be assembled.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(#[from] Box<figment::Error>);

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    /// `PostgreSQL` connection URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Drop and recreate the schema at startup. Only for ephemeral setups.
    pub drop_schema_on_start: bool,
    /// Job ids loaded per batch.
    pub recovery_batch_size: usize,
    /// Look-back period for finished jobs loaded at recovery; all when absent.
    pub finished_jobs_look_back_ms: Option<u64>,
    /// Transaction retry settings.
    pub transaction: TransactionConfig,
    /// Housekeeping settings.
    pub housekeeping: HousekeepingConfig,
    /// Task launcher rebind settings.
    pub launcher: LauncherConfig,
}

/// Retry settings for lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff in milliseconds, doubled on each retry.
    pub initial_backoff_ms: u64,
}

/// Housekeeping settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Hard-delete rows instead of marking jobs removed.
    pub remove_from_db: bool,
    /// Jobs purged per transaction.
    pub batch_size: usize,
}

/// Task launcher rebind settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Upper bound on the rebind loop, in milliseconds.
    pub reconnection_timeout_ms: u64,
    /// Pause between rebind attempts, in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: 4,
            drop_schema_on_start: false,
            recovery_batch_size: 100,
            finished_jobs_look_back_ms: None,
            transaction: TransactionConfig::default(),
            housekeeping: HousekeepingConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 1000,
        }
    }
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            remove_from_db: false,
            batch_size: 100,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            reconnection_timeout_ms: 10_000,
            retry_interval_ms: 1_000,
        }
    }
}

impl StateStoreConfig {
    /// Loads configuration from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = path {
            figment = figment.merge(Toml::file(file));
        }
        Self::from_figment(figment.merge(Env::prefixed("JOBVAULT_").split("__")))
    }

    /// Extracts configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|err| ConfigError(Box::new(err)))
    }

    /// Returns the finished-jobs look-back period.
    #[must_use]
    pub fn finished_jobs_look_back(&self) -> Option<Duration> {
        self.finished_jobs_look_back_ms.map(Duration::from_millis)
    }
}

impl TransactionConfig {
    /// Converts to the retry policy used by the transaction helper.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

impl HousekeepingConfig {
    /// Converts to the housekeeping policy.
    #[must_use]
    pub const fn policy(&self) -> HousekeepingPolicy {
        HousekeepingPolicy {
            remove_from_db: self.remove_from_db,
            batch_size: self.batch_size,
        }
    }
}

impl LauncherConfig {
    /// Returns the reconnection timeout.
    #[must_use]
    pub const fn reconnection_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnection_timeout_ms)
    }

    /// Returns the pause between rebind attempts.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[rstest]
    fn defaults_match_documented_values() {
        let config = StateStoreConfig::default();
        assert_eq!(config.recovery_batch_size, 100);
        assert_eq!(config.transaction.retry_policy().max_retries, 5);
        assert_eq!(
            config.transaction.retry_policy().initial_backoff,
            Duration::from_secs(1)
        );
        assert!(!config.housekeeping.remove_from_db);
        assert!(config.database_url.is_none());
    }

    #[rstest]
    fn toml_overrides_nested_sections() {
        let figment = Figment::from(Serialized::defaults(StateStoreConfig::default())).merge(
            Toml::string(
                r#"
                recovery_batch_size = 25
                finished_jobs_look_back_ms = 60000

                [housekeeping]
                remove_from_db = true
                "#,
            ),
        );
        let config = StateStoreConfig::from_figment(figment).expect("config should parse");
        assert_eq!(config.recovery_batch_size, 25);
        assert!(config.housekeeping.remove_from_db);
        assert_eq!(config.housekeeping.batch_size, 100);
        assert_eq!(
            config.finished_jobs_look_back(),
            Some(Duration::from_secs(60))
        );
    }

    #[rstest]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "jobvault.toml",
                "database_url = \"postgres://file\"\n[transaction]\nmax_retries = 2\n",
            )?;
            jail.set_env("JOBVAULT_TRANSACTION__MAX_RETRIES", "7");
            let config = StateStoreConfig::load(Some(Path::new("jobvault.toml")))
                .map_err(|err| err.to_string())?;
            assert_eq!(config.database_url.as_deref(), Some("postgres://file"));
            assert_eq!(config.transaction.max_retries, 7);
            Ok(())
        });
    }
}
