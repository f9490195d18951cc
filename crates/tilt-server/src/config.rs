//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (TILT_HOST, TILT_PORT)
//! - TOML configuration file

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tilt_core::HubConfig;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket endpoint paths.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Stale producer eviction.
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// WebSocket endpoint paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Path producers connect to.
    #[serde(default = "default_producer_path")]
    pub producer_path: String,

    /// Path consumers connect to.
    #[serde(default = "default_consumer_path")]
    pub consumer_path: String,
}

/// Eviction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Seconds between eviction scans.
    #[serde(default = "default_eviction_interval")]
    pub interval_secs: u64,

    /// Producers silent for longer than this many seconds are evicted.
    #[serde(default = "default_eviction_threshold")]
    pub threshold_secs: u8,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("TILT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    std::env::var("TILT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_producer_path() -> String {
    "/ws/web".to_string()
}

fn default_consumer_path() -> String {
    "/ws/unity".to_string()
}

fn default_eviction_interval() -> u64 {
    10
}

fn default_eviction_threshold() -> u8 {
    tilt_core::DEFAULT_EVICTION_THRESHOLD_SECS
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            endpoints: EndpointsConfig::default(),
            eviction: EvictionConfig::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            producer_path: default_producer_path(),
            consumer_path: default_consumer_path(),
        }
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_eviction_interval(),
            threshold_secs: default_eviction_threshold(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl EvictionConfig {
    /// Time between eviction scans.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tilt-relay.toml",
            "/etc/tilt-relay/tilt-relay.toml",
            "~/.config/tilt-relay/tilt-relay.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that parse but cannot run.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.eviction.interval_secs == 0 {
            bail!("eviction.interval_secs must be greater than zero");
        }
        if self.eviction.threshold_secs >= 60 {
            bail!("eviction.threshold_secs must be below 60");
        }
        for path in [&self.endpoints.producer_path, &self.endpoints.consumer_path] {
            if !path.starts_with('/') {
                bail!("endpoint path {:?} must start with '/'", path);
            }
        }
        if self.endpoints.producer_path == self.endpoints.consumer_path {
            bail!("producer and consumer endpoints must differ");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Hub settings derived from this configuration.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            eviction_threshold_secs: self.eviction.threshold_secs,
        }
    }
}
