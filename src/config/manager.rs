//! Configuration Manager

use super::ClientConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::tracker::TrackerEndpoint;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<ClientConfig> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: ClientConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = ClientConfig::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<ClientConfig> {
        let mut config = ClientConfig::default();

        if let Ok(endpoints) = std::env::var("STORLINK_TRACKERS") {
            config.tracker.endpoints = endpoints
                .split(',')
                .map(|s| s.trim().parse::<TrackerEndpoint>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Invalid STORLINK_TRACKERS: {}", endpoints))?;
        }

        if let Ok(timeout) = std::env::var("STORLINK_CONNECT_TIMEOUT") {
            config.tracker.connect_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid STORLINK_CONNECT_TIMEOUT: {}", timeout))?;
        }

        if let Ok(pool_enabled) = std::env::var("STORLINK_POOL_ENABLED") {
            config.tracker.pool_enabled = pool_enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid STORLINK_POOL_ENABLED: {}", pool_enabled))?;
        }

        if let Ok(max_idle) = std::env::var("STORLINK_POOL_MAX_IDLE") {
            config.pool.max_idle_per_endpoint = max_idle
                .parse::<usize>()
                .with_context(|| format!("Invalid STORLINK_POOL_MAX_IDLE: {}", max_idle))?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tracker.connect_timeout.as_millis() == 0 {
            bail!("tracker.connect_timeout must be greater than 0");
        }

        if self.tracker.connect_timeout.as_secs() > 300 {
            bail!("tracker.connect_timeout cannot exceed 5 minutes");
        }

        for endpoint in &self.tracker.endpoints {
            if endpoint.port() == 0 {
                bail!("tracker endpoint {} has port 0", endpoint);
            }
        }

        if self.tracker.pool_enabled {
            if self.pool.max_idle_per_endpoint == 0 {
                bail!("pool.max_idle_per_endpoint must be greater than 0 when pooling is enabled");
            }
            if self.pool.idle_timeout.as_millis() == 0 {
                bail!("pool.idle_timeout must be greater than 0");
            }
            if self.pool.connect_timeout.as_millis() == 0 {
                bail!("pool.connect_timeout must be greater than 0");
            }
        }

        Ok(())
    }
}
