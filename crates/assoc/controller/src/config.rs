//! Configuration for assoc-controller

use crate::queue::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssocConfig {
    /// Reconcile loop configuration
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reconcile loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum concurrent reconciles
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,

    /// Deadline for a single reconcile in seconds
    #[serde(default = "default_reconcile_timeout")]
    pub reconcile_timeout_secs: u64,

    /// First retry delay after an error, in milliseconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound of the retry delay after errors, in seconds
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_max_concurrent(),
            reconcile_timeout_secs: default_reconcile_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

impl ControllerConfig {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Capacity of the change event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_max_concurrent() -> usize {
    4
}

fn default_reconcile_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    1000
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AssocConfig {
    /// Load configuration from defaults, an optional file and `ASSOC_` env vars
    ///
    /// Nested keys use a double underscore, e.g.
    /// `ASSOC_CONTROLLER__MAX_CONCURRENT_RECONCILES=8`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&AssocConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ASSOC")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AssocConfig::default();
        assert_eq!(config.controller.max_concurrent_reconciles, 4);
        assert_eq!(config.controller.reconcile_timeout(), Duration::from_secs(30));
        assert_eq!(config.store.event_capacity, 1024);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_backoff_from_config() {
        let backoff = ControllerConfig::default().backoff();
        assert_eq!(backoff.base, Duration::from_millis(5));
        assert_eq!(backoff.max, Duration::from_secs(1000));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AssocConfig::load(None).unwrap();
        assert!(config.controller.max_concurrent_reconciles >= 1);
    }
}
