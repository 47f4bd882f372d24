//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    CONTROLLER_NAME, DEFAULT_ERROR_BACKOFF_MAX_SECS, DEFAULT_ERROR_BACKOFF_MIN_SECS,
    DEFAULT_LABEL_WORKER_COUNT, DEFAULT_METRICS_PORT, DEFAULT_STORE_REQUEST_TIMEOUT_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// The configuration is read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the HTTP server (metrics, probes, reschedule endpoint)
    pub metrics_port: u16,
    /// Number of async label workers draining the label event queue
    pub label_worker_count: usize,
    /// Deadline applied to every object store request (seconds)
    pub store_request_timeout_secs: u64,
    /// Minimum requeue delay after a failed reconcile (seconds)
    pub error_backoff_min_secs: u64,
    /// Maximum requeue delay after a failed reconcile (seconds)
    pub error_backoff_max_secs: u64,
    /// Delay before restarting a watch stream that ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Field manager recorded on patches and updates
    pub field_manager: String,
    /// Optional YAML file extending the built-in replica field table
    pub replica_fields_file: Option<PathBuf>,
    /// Default log directive when `RUST_LOG` is not set
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            label_worker_count: DEFAULT_LABEL_WORKER_COUNT,
            store_request_timeout_secs: DEFAULT_STORE_REQUEST_TIMEOUT_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            field_manager: CONTROLLER_NAME.to_string(),
            replica_fields_file: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to the default for that key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            metrics_port: parsed(&lookup, "METRICS_PORT").unwrap_or(defaults.metrics_port),
            // A pool without workers would never drain the queue
            label_worker_count: parsed(&lookup, "LABEL_WORKER_COUNT")
                .filter(|count: &usize| *count > 0)
                .unwrap_or(defaults.label_worker_count),
            store_request_timeout_secs: parsed(&lookup, "STORE_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.store_request_timeout_secs),
            error_backoff_min_secs: parsed(&lookup, "ERROR_BACKOFF_MIN_SECS")
                .unwrap_or(defaults.error_backoff_min_secs),
            error_backoff_max_secs: parsed(&lookup, "ERROR_BACKOFF_MAX_SECS")
                .unwrap_or(defaults.error_backoff_max_secs),
            watch_restart_delay_secs: parsed(&lookup, "WATCH_RESTART_DELAY_SECS")
                .unwrap_or(defaults.watch_restart_delay_secs),
            field_manager: lookup("FIELD_MANAGER")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.field_manager),
            replica_fields_file: lookup("REPLICA_FIELDS_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_level: lookup("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
        }
    }

    /// Get the per-request store deadline
    pub fn store_request_timeout(&self) -> Duration {
        Duration::from_secs(self.store_request_timeout_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Parse the value of `key`; missing or malformed values are `None`
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ControllerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.label_worker_count, 1);
        assert_eq!(config.field_manager, CONTROLLER_NAME);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.replica_fields_file.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config_from(&[
            ("METRICS_PORT", "9090"),
            ("LABEL_WORKER_COUNT", "4"),
            ("STORE_REQUEST_TIMEOUT_SECS", "7"),
            ("REPLICA_FIELDS_FILE", "/etc/replica-fields.yaml"),
            ("LOG_FORMAT", "TEXT"),
            ("LOG_LEVEL", "DEBUG"),
        ]);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.label_worker_count, 4);
        assert_eq!(config.store_request_timeout(), Duration::from_secs(7));
        assert_eq!(
            config.replica_fields_file,
            Some(PathBuf::from("/etc/replica-fields.yaml"))
        );
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[("METRICS_PORT", "not-a-port"), ("LABEL_WORKER_COUNT", "0")]);
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.label_worker_count, DEFAULT_LABEL_WORKER_COUNT);
    }

    #[test]
    fn test_numeric_settings_of_different_widths() {
        let config = config_from(&[
            ("METRICS_PORT", "8081"),
            ("LABEL_WORKER_COUNT", " 3 "),
            ("ERROR_BACKOFF_MIN_SECS", "2"),
            ("ERROR_BACKOFF_MAX_SECS", "120"),
            ("WATCH_RESTART_DELAY_SECS", "9"),
        ]);
        assert_eq!(config.metrics_port, 8081_u16);
        assert_eq!(config.label_worker_count, 3_usize);
        assert_eq!(config.error_backoff_min_secs, 2_u64);
        assert_eq!(config.error_backoff_max_secs, 120_u64);
        assert_eq!(config.watch_restart_delay(), Duration::from_secs(9));
    }
}
