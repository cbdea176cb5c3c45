//! Configuration Types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pool::PoolConfig;
use crate::tracker::TrackerEndpoint;

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Main client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub tracker: TrackerConfig,
    pub pool: PoolConfig,
}

/// Tracker connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Tracker endpoints, as `host:port` strings
    pub endpoints: Vec<TrackerEndpoint>,
    /// Bound on a single direct TCP connect
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Whether handles acquire transports through the shared pool
    pub pool_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig {
                endpoints: vec![],
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                pool_enabled: true,
            },
            pool: PoolConfig::default(),
        }
    }
}
