//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. The request
//! section carries the stale-check switches; at runtime they live in a
//! shared [`StaleChecks`] handed to every pipeline stage.

use crate::ops::telemetry::LOG_LEVELS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Request envelope behaviour.
    #[serde(default)]
    pub request: RequestConfig,

    /// Pipeline stage sizing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Telemetry and logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Request envelope configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Treat requests whose connection closed as stale.
    #[serde(default = "default_stale_connection_check")]
    pub stale_connection_check: bool,

    /// Treat requests older than their session timeout as stale.
    #[serde(default)]
    pub stale_latency_check: bool,

    /// Payload size above which ingress tracks a request as large.
    /// Absent disables large-request accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_request_threshold: Option<u32>,

    /// Upper bound on in-flight bytes held by large requests.
    #[serde(default = "default_large_request_max_bytes")]
    pub large_request_max_bytes: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            stale_connection_check: default_stale_connection_check(),
            stale_latency_check: false,
            large_request_threshold: None,
            large_request_max_bytes: default_large_request_max_bytes(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded queue depth between stages.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_stale_connection_check() -> bool {
    true
}

fn default_large_request_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(check) = overrides.stale_connection_check {
            self.request.stale_connection_check = check;
        }
        if let Some(check) = overrides.stale_latency_check {
            self.request.stale_latency_check = check;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_request()?;
        self.validate_pipeline()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_request(&self) -> Result<()> {
        if self.request.large_request_max_bytes == 0 {
            anyhow::bail!("request.large_request_max_bytes must be > 0");
        }

        if let Some(threshold) = self.request.large_request_threshold {
            if u64::from(threshold) > self.request.large_request_max_bytes {
                anyhow::bail!(
                    "request.large_request_threshold ({}) cannot exceed large_request_max_bytes ({})",
                    threshold,
                    self.request.large_request_max_bytes
                );
            }
        }

        Ok(())
    }

    fn validate_pipeline(&self) -> Result<()> {
        if self.pipeline.queue_capacity == 0 {
            anyhow::bail!("pipeline.queue_capacity must be > 0");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                LOG_LEVELS,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override the stale connection check.
    pub stale_connection_check: Option<bool>,
    /// Override the stale latency check.
    pub stale_latency_check: Option<bool>,
}

// ============================================================================
// Runtime stale-check switches
// ============================================================================

/// Stale-request switches shared by every pipeline stage.
///
/// Stages read these from arbitrary threads while an operator may flip them
/// at runtime. Writes use `Release` and reads use `Acquire`, so a stage that
/// observes a new value also observes everything written before the toggle.
#[derive(Debug)]
pub struct StaleChecks {
    connection: AtomicBool,
    latency: AtomicBool,
}

impl StaleChecks {
    /// Create switches with explicit initial values.
    pub const fn new(connection: bool, latency: bool) -> Self {
        Self {
            connection: AtomicBool::new(connection),
            latency: AtomicBool::new(latency),
        }
    }

    /// Build switches from the request configuration section.
    pub fn from_config(config: &RequestConfig) -> Self {
        Self::new(config.stale_connection_check, config.stale_latency_check)
    }

    /// Both checks off.
    pub const fn disabled() -> Self {
        Self::new(false, false)
    }

    /// Whether a closed connection makes its requests stale.
    pub fn connection_check(&self) -> bool {
        self.connection.load(Ordering::Acquire)
    }

    /// Whether requests older than the session timeout are stale.
    pub fn latency_check(&self) -> bool {
        self.latency.load(Ordering::Acquire)
    }

    /// Toggle the connection check.
    pub fn set_connection_check(&self, enabled: bool) {
        self.connection.store(enabled, Ordering::Release);
        tracing::info!(enabled, "stale connection check updated");
    }

    /// Toggle the latency check.
    pub fn set_latency_check(&self, enabled: bool) {
        self.latency.store(enabled, Ordering::Release);
        tracing::info!(enabled, "stale latency check updated");
    }
}

impl Default for StaleChecks {
    fn default() -> Self {
        Self::from_config(&RequestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::from_toml("").unwrap();
        assert!(config.request.stale_connection_check);
        assert!(!config.request.stale_latency_check);
        assert_eq!(config.request.large_request_threshold, None);
        assert_eq!(config.request.large_request_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.pipeline.queue_capacity, 1024);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn threshold_above_max_is_rejected() {
        let result = Config::from_toml(
            r#"
[request]
large_request_threshold = 2048
large_request_max_bytes = 1024
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("large_request_threshold"));
    }

    #[test]
    fn overrides_replace_stale_switches() {
        let mut config = Config::default();
        config.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".to_string()),
            stale_connection_check: Some(false),
            stale_latency_check: Some(true),
        });
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(!config.request.stale_connection_check);
        assert!(config.request.stale_latency_check);
    }

    #[test]
    fn stale_checks_toggle_at_runtime() {
        let checks = StaleChecks::default();
        assert!(checks.connection_check());
        assert!(!checks.latency_check());

        checks.set_connection_check(false);
        checks.set_latency_check(true);
        assert!(!checks.connection_check());
        assert!(checks.latency_check());
    }
}
