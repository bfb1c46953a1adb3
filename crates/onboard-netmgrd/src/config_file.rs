//! Configuration file support for onboardd
//!
//! Loads and validates onboardd configuration from TOML files.
//! Default location: /etc/onboard/onboardd.conf

use onboard_orch_common::{ApplyError, ApplyResult, RetrySchedule, RetryTimings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/onboard/onboardd.conf";

/// Appliance connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Management address
    #[serde(default = "default_host")]
    pub host: String,

    /// Management HTTPS port
    #[serde(default = "default_port")]
    pub port: u16,

    /// REST user
    #[serde(default = "default_username")]
    pub username: String,

    /// REST password
    #[serde(default)]
    pub password: String,

    /// Verify the appliance certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Retry schedules behind the named retry policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_short_retries")]
    pub short_retries: u32,

    #[serde(default = "default_short_interval")]
    pub short_interval_ms: u64,

    #[serde(default = "default_medium_retries")]
    pub medium_retries: u32,

    #[serde(default = "default_medium_interval")]
    pub medium_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter, overridden by RUST_LOG
    #[serde(default = "default_level")]
    pub level: String,
}

/// Complete onboardd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardConfig {
    #[serde(default)]
    pub appliance: ApplianceConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_short_retries() -> u32 {
    3
}

fn default_short_interval() -> u64 {
    500
}

fn default_medium_retries() -> u32 {
    60
}

fn default_medium_interval() -> u64 {
    1000
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            verify_tls: false,
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            short_retries: default_short_retries(),
            short_interval_ms: default_short_interval(),
            medium_retries: default_medium_retries(),
            medium_interval_ms: default_medium_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl OnboardConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> ApplyResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ApplyError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ApplyError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> ApplyResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ApplyError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Base URL of the appliance REST API
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.appliance.host, self.appliance.port)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.appliance.timeout_secs)
    }

    /// Concrete schedules for the named retry policies
    pub fn retry_timings(&self) -> RetryTimings {
        RetryTimings {
            short: RetrySchedule::new(
                self.retry.short_retries,
                Duration::from_millis(self.retry.short_interval_ms),
            ),
            medium: RetrySchedule::new(
                self.retry.medium_retries,
                Duration::from_millis(self.retry.medium_interval_ms),
            ),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ApplyResult<()> {
        if self.appliance.host.trim().is_empty() {
            return Err(ApplyError::Config("host must not be empty".to_string()));
        }

        if self.appliance.port == 0 {
            return Err(ApplyError::Config("port must be > 0".to_string()));
        }

        if self.retry.medium_retries == 0 {
            return Err(ApplyError::Config(
                "medium_retries must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
