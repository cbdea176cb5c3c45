//! Tracker Connections
//!
//! The connection handle used by protocol code to talk to a tracker: one
//! handle, one endpoint, at most one live transport at a time.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::error::{ConnectionError, Result};
use crate::pool::ConnectionPool;
use crate::tracker::{dial, TrackerEndpoint};

/// Current time in milliseconds since the epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// How a handle acquires transports: directly with a bounded dial, or
/// through a shared pool. Injected at construction so a handle's behavior
/// is fixed up front instead of read from process-wide state.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub pool: Option<Arc<ConnectionPool>>,
}

impl ConnectionSettings {
    /// Direct dialing with the given connect timeout, no pooling
    pub fn direct(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            pool: None,
        }
    }

    /// Acquire transports from `pool` instead of dialing directly
    pub fn pooled(pool: Arc<ConnectionPool>) -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool: Some(pool),
        }
    }

    /// Build settings from client configuration, constructing the shared
    /// pool when pooling is enabled. Clone the result for each handle.
    pub fn from_config(config: &ClientConfig) -> Self {
        let pool = if config.tracker.pool_enabled {
            Some(Arc::new(ConnectionPool::new(config.pool.clone())))
        } else {
            None
        };
        Self {
            connect_timeout: config.tracker.connect_timeout,
            pool,
        }
    }
}

/// A logical connection to one tracker endpoint.
///
/// The transport slot is explicit: a handle is either holding a live
/// transport or empty, and `acquire` / `close` are the only transitions
/// between the two. Handles are single-owner; the `&mut self` API is the
/// concurrency contract.
pub struct TrackerConnection {
    endpoint: TrackerEndpoint,
    stream: Option<TcpStream>,
    last_access: u64,
    settings: ConnectionSettings,
}

impl TrackerConnection {
    /// Create an empty handle; the transport is acquired on first use
    pub fn new(endpoint: TrackerEndpoint, settings: ConnectionSettings) -> Self {
        Self {
            endpoint,
            stream: None,
            last_access: now_millis(),
            settings,
        }
    }

    /// Create a handle and acquire its transport immediately. A failed
    /// acquisition fails construction; no partial handle results.
    pub async fn connect(endpoint: TrackerEndpoint, settings: ConnectionSettings) -> Result<Self> {
        let mut conn = Self::new(endpoint, settings);
        conn.acquire().await?;
        Ok(conn)
    }

    /// Adopt an already-open transport. No acquisition occurs until the
    /// transport is closed and the handle is used again.
    pub fn with_stream(
        stream: TcpStream,
        endpoint: TrackerEndpoint,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            endpoint,
            stream: Some(stream),
            last_access: now_millis(),
            settings,
        }
    }

    /// Get the held transport, resolving one first if the slot is empty.
    ///
    /// Idempotent: a held transport is returned unchanged. An empty slot
    /// is filled from the pool (adopting the pool-recorded last-access
    /// time along with the transport) or by a direct dial under the
    /// configured timeout. Pool failures surface as-is; there is no
    /// direct-dial fallback.
    pub async fn acquire(&mut self) -> Result<&mut TcpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => match &self.settings.pool {
                Some(pool) => {
                    let conn = pool.checkout(&self.endpoint).await?;
                    self.last_access = conn.last_access;
                    conn.stream
                }
                None => dial::dial(&self.endpoint, self.settings.connect_timeout).await?,
            },
        };
        Ok(self.stream.insert(stream))
    }

    /// Read and write halves of the transport, acquiring it first
    pub async fn split(&mut self) -> Result<(ReadHalf<'_>, WriteHalf<'_>)> {
        let stream = self.acquire().await?;
        Ok(stream.split())
    }

    /// True iff a transport is held and the OS still reports a peer for
    /// it. Never triggers an acquisition: an empty handle is simply not
    /// connected.
    pub fn is_connected(&self) -> bool {
        match &self.stream {
            Some(stream) => stream.peer_addr().is_ok(),
            None => false,
        }
    }

    /// Stronger than [`is_connected`](Self::is_connected): also requires a
    /// nonzero remote port, resolvable local and peer addresses, and an
    /// inbound half the peer has not shut down. Pool consumers check this
    /// before reusing a transport.
    pub fn is_available(&self) -> bool {
        let stream = match &self.stream {
            Some(stream) => stream,
            None => return false,
        };
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(_) => return false,
        };
        if peer.port() == 0 {
            return false;
        }
        if stream.local_addr().is_err() {
            return false;
        }
        !dial::half_closed(stream)
    }

    /// Release the transport: back to the pool when pooling is enabled,
    /// otherwise a graceful shutdown of the link. Closing an empty handle
    /// is a no-op, and the slot is cleared on every exit path, so a
    /// second close never touches a stale transport.
    pub async fn close(&mut self) -> Result<()> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => return Ok(()),
        };

        match &self.settings.pool {
            Some(pool) => {
                pool.checkin(&self.endpoint, stream);
                Ok(())
            }
            None => {
                let mut stream = stream;
                debug!("Closing tracker connection to {}", self.endpoint);
                // slot already cleared above: a failed shutdown must not
                // leave the handle holding a dead transport
                stream.shutdown().await.map_err(ConnectionError::Close)
            }
        }
    }

    /// The tracker endpoint this handle is bound to
    pub fn endpoint(&self) -> &TrackerEndpoint {
        &self.endpoint
    }

    /// Milliseconds since the epoch at which this connection was last
    /// handed out. Pooled acquisitions overwrite this with the pool's
    /// recorded value.
    pub fn last_access_time(&self) -> u64 {
        self.last_access
    }

    pub fn set_last_access_time(&mut self, millis: u64) {
        self.last_access = millis;
    }
}

impl Drop for TrackerConnection {
    fn drop(&mut self) {
        // last-resort release for handles dropped without close(): a
        // pooled transport is checked back in, a direct one closes with
        // the socket
        if let Some(stream) = self.stream.take() {
            if let Some(pool) = &self.settings.pool {
                pool.checkin(&self.endpoint, stream);
            }
        }
    }
}
