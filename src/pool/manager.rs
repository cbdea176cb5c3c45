//! Connection Pool Implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::Result;
use crate::tracker::connection::now_millis;
use crate::tracker::dial::{dial, half_closed};
use crate::tracker::TrackerEndpoint;

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle transports retained per endpoint; checkins beyond this are dropped
    pub max_idle_per_endpoint: usize,
    /// Idle transports older than this are discarded at checkout or cleanup
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Connect timeout for transports the pool dials on a miss
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_endpoint: 8,
            idle_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A transport checked out of the pool, together with the last-access
/// timestamp the pool recorded for it. Reused transports carry history;
/// freshly dialed ones carry a fresh timestamp.
#[derive(Debug)]
pub struct CheckedOut {
    pub stream: TcpStream,
    pub last_access: u64,
}

/// An idle transport waiting for reuse
struct IdleConnection {
    stream: TcpStream,
    pooled_at: Instant,
    last_access: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    discarded: AtomicUsize,
}

/// Pool statistics snapshot
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub hits: usize,
    pub misses: usize,
    pub discarded: usize,
    pub idle: usize,
}

/// Reuse cache for tracker transports.
///
/// Checkout hands exclusive ownership of a transport to exactly one
/// handle; the same physical transport only reaches another handle after
/// the current holder checks it back in. Dead and expired idle entries
/// are the pool's problem: they are discarded here, at checkout and
/// checkin, and never handed out.
pub struct ConnectionPool {
    config: PoolConfig,
    idle: Mutex<HashMap<TrackerEndpoint, Vec<IdleConnection>>>,
    counters: PoolCounters,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(HashMap::new()),
            counters: PoolCounters::default(),
        }
    }

    /// Obtain a usable transport for `endpoint`: a retained idle one when
    /// a live candidate exists, otherwise a fresh dial under the pool's
    /// connect timeout. Dial failures surface to the caller unchanged.
    pub async fn checkout(&self, endpoint: &TrackerEndpoint) -> Result<CheckedOut> {
        if let Some(conn) = self.take_idle(endpoint) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Reusing pooled connection to {}", endpoint);
            return Ok(conn);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let stream = dial(endpoint, self.config.connect_timeout).await?;
        Ok(CheckedOut {
            stream,
            last_access: now_millis(),
        })
    }

    /// Return a transport for reuse. The recorded last-access time is
    /// refreshed to now. Transports whose peer is gone, and checkins past
    /// the per-endpoint capacity, are dropped instead of retained.
    pub fn checkin(&self, endpoint: &TrackerEndpoint, stream: TcpStream) {
        if half_closed(&stream) {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            debug!("Refusing dead connection to {} at checkin", endpoint);
            return;
        }

        let mut idle = self.idle.lock().unwrap();
        let entries = idle.entry(endpoint.clone()).or_default();
        if entries.len() >= self.config.max_idle_per_endpoint {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            debug!("Pool full for {}, dropping connection", endpoint);
            return;
        }

        entries.push(IdleConnection {
            stream,
            pooled_at: Instant::now(),
            last_access: now_millis(),
        });
        debug!(
            "Returned connection to pool for {} (idle: {})",
            endpoint,
            entries.len()
        );
    }

    /// Pop idle entries for `endpoint` until a live one turns up,
    /// discarding expired and half-closed candidates along the way
    fn take_idle(&self, endpoint: &TrackerEndpoint) -> Option<CheckedOut> {
        let mut idle = self.idle.lock().unwrap();
        let entries = idle.get_mut(endpoint)?;

        while let Some(entry) = entries.pop() {
            if entry.pooled_at.elapsed() >= self.config.idle_timeout
                || half_closed(&entry.stream)
            {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                debug!("Discarding stale pooled connection to {}", endpoint);
                continue;
            }
            return Some(CheckedOut {
                stream: entry.stream,
                last_access: entry.last_access,
            });
        }
        None
    }

    /// Sweep out idle transports past the idle timeout
    pub fn cleanup_idle(&self) {
        let mut idle = self.idle.lock().unwrap();
        let idle_timeout = self.config.idle_timeout;
        let mut total_removed = 0;

        for (endpoint, entries) in idle.iter_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.pooled_at.elapsed() < idle_timeout);
            let removed = before - entries.len();
            if removed > 0 {
                debug!("Cleaned up {} idle connections to {}", removed, endpoint);
                total_removed += removed;
            }
        }
        idle.retain(|_, entries| !entries.is_empty());

        if total_removed > 0 {
            self.counters
                .discarded
                .fetch_add(total_removed, Ordering::Relaxed);
            info!(
                "Connection pool cleanup: removed {} idle connections",
                total_removed
            );
        }
    }

    /// Drop every idle transport
    pub fn drain(&self) {
        let mut idle = self.idle.lock().unwrap();
        let dropped: usize = idle.values().map(Vec::len).sum();
        idle.clear();
        if dropped > 0 {
            info!("Drained {} idle tracker connections", dropped);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().unwrap().values().map(Vec::len).sum();
        PoolStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle_per_endpoint, 8);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn fresh_pool_reports_empty_stats() {
        let pool = ConnectionPool::new(PoolConfig::default());
        let stats = pool.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.discarded, 0);
        assert_eq!(stats.idle, 0);
    }

    #[tokio::test]
    async fn checkout_miss_fails_without_listener() {
        let pool = ConnectionPool::new(PoolConfig {
            connect_timeout: Duration::from_millis(500),
            ..PoolConfig::default()
        });

        // Bind then drop a listener so the port is known-closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = TrackerEndpoint::new(addr.ip().to_string(), addr.port());
        let result = pool.checkout(&endpoint).await;
        assert!(result.is_err());
        assert_eq!(pool.stats().misses, 1);
    }
}
