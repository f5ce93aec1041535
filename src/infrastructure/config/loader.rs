use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::MAX_DELAY_SECS;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(u32),

    #[error("Lock ceiling ({lock_ceiling_secs}s) must exceed the longest routine timeout ({longest_timeout_secs}s)")]
    LockCeilingTooShort { lock_ceiling_secs: u64, longest_timeout_secs: u64 },

    #[error("Invalid {name}: {value}. Must be between 0 and 1")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("Invalid {name}: {secs}s. Must be at most {max}s", max = MAX_DELAY_SECS)]
    DelayTooLong { name: &'static str, secs: u64 },

    #[error("Invalid generator backend: {0}. Must be one of: http, mock")]
    InvalidBackend(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cartographer/config.yaml (project config)
    /// 3. .cartographer/local.yaml (project local overrides, optional)
    /// 4. Environment variables (CARTOGRAPHER_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CARTOGRAPHER_").split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".cartographer/config.yaml"))
            .merge(Yaml::file(".cartographer/local.yaml"))
            .merge(Env::prefixed("CARTOGRAPHER_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.scheduler.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.scheduler.batch_size));
        }

        // The soft lock must outlive any single unit of work.
        let longest_timeout_secs =
            config.generation.single_step_timeout_secs.max(config.generation.multi_agent_timeout_secs);
        if config.scheduler.lock_ceiling_secs <= longest_timeout_secs {
            return Err(ConfigError::LockCeilingTooShort {
                lock_ceiling_secs: config.scheduler.lock_ceiling_secs,
                longest_timeout_secs,
            });
        }

        let delays = [
            ("scheduler.lock_ceiling_secs", config.scheduler.lock_ceiling_secs),
            ("backoff.phase1_error_secs", config.backoff.phase1_error_secs),
            ("backoff.phase2_error_secs", config.backoff.phase2_error_secs),
        ];
        for (name, secs) in delays {
            if secs > MAX_DELAY_SECS {
                return Err(ConfigError::DelayTooLong { name, secs });
            }
        }

        if !["http", "mock"].contains(&config.generation.backend.as_str()) {
            return Err(ConfigError::InvalidBackend(config.generation.backend.clone()));
        }

        if config.generation.single_step_timeout_secs == 0 || config.generation.multi_agent_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("routine timeouts must be positive".to_string()));
        }

        if config.sequencing.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed("sequencing.max_attempts must be at least 1".to_string()));
        }

        let thresholds = [
            ("convergence.jaccard_threshold", config.convergence.jaccard_threshold),
            ("convergence.stability_threshold", config.convergence.stability_threshold),
            ("convergence.novelty_threshold", config.convergence.novelty_threshold),
            ("convergence.early_stop_threshold", config.convergence.early_stop_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if config.convergence.window_size == 0 {
            return Err(ConfigError::ValidationFailed("convergence.window_size must be at least 1".to_string()));
        }

        if config.selection.window == 0 {
            return Err(ConfigError::ValidationFailed("selection.window must be at least 1".to_string()));
        }

        if config.selection.novelty_weight < 0.0 || config.selection.support_weight < 0.0 {
            return Err(ConfigError::ValidationFailed("selection weights cannot be negative".to_string()));
        }

        Ok(())
    }
}
