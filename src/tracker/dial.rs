//! Tracker Dialing
//!
//! Establishes fresh TCP transports to tracker endpoints with bounded
//! connect timeouts.

use std::io;
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::SockRef;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ConnectionError, Result};
use crate::tracker::TrackerEndpoint;

/// Open a new transport to `endpoint`, trying each resolved address in
/// turn under `connect_timeout`. The last per-address error wins when all
/// attempts fail.
pub async fn dial(endpoint: &TrackerEndpoint, connect_timeout: Duration) -> Result<TcpStream> {
    debug!("Dialing tracker {}", endpoint);

    let addrs = resolve(endpoint, connect_timeout).await?;

    let mut last_error = None;
    for addr in addrs {
        match try_connect(endpoint, addr, connect_timeout).await {
            Ok(stream) => {
                debug!("Connected to tracker {} at {}", endpoint, addr);
                return Ok(stream);
            }
            Err(e) => {
                warn!("Failed to connect to tracker {} at {}: {}", endpoint, addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ConnectionError::Resolve {
        endpoint: endpoint.clone(),
        reason: "no addresses resolved".to_string(),
    }))
}

/// Resolve the endpoint's host to socket addresses
async fn resolve(
    endpoint: &TrackerEndpoint,
    connect_timeout: Duration,
) -> Result<Vec<SocketAddr>> {
    let lookup = lookup_host((endpoint.host(), endpoint.port()));
    match timeout(connect_timeout, lookup).await {
        Ok(Ok(addrs)) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if addrs.is_empty() {
                return Err(ConnectionError::Resolve {
                    endpoint: endpoint.clone(),
                    reason: "DNS returned no addresses".to_string(),
                });
            }
            debug!("Resolved tracker {} to {} addresses", endpoint, addrs.len());
            Ok(addrs)
        }
        Ok(Err(e)) => Err(ConnectionError::Resolve {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ConnectionError::Resolve {
            endpoint: endpoint.clone(),
            reason: "DNS resolution timed out".to_string(),
        }),
    }
}

/// Connect to a single resolved address under the timeout
async fn try_connect(
    endpoint: &TrackerEndpoint,
    addr: SocketAddr,
    connect_timeout: Duration,
) -> Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ConnectionError::Connect {
            endpoint: endpoint.clone(),
            source: e,
        }),
        Err(_) => Err(ConnectionError::ConnectTimeout {
            endpoint: endpoint.clone(),
            timeout: connect_timeout,
        }),
    }
}

/// Probe whether the peer has torn down its half of the link.
///
/// A socket stays "connected" at the transport layer for a window after
/// the peer shuts down its write side; handing such a socket to protocol
/// code fails mid-exchange instead of at checkout. A nonblocking
/// `MSG_PEEK` distinguishes the cases: EOF means the inbound half is
/// gone, `WouldBlock` or pending bytes mean the link is still live.
pub(crate) fn half_closed(stream: &TcpStream) -> bool {
    let sock = SockRef::from(stream);
    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    match sock.peek(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
        Err(_) => true,
    }
}
