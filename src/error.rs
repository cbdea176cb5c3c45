//! Connection Errors
//!
//! Typed failures for the tracker connection path. Pool checkouts surface
//! the same variants as a direct dial; there is no separate pool error and
//! no fallback from one acquisition path to the other.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::tracker::TrackerEndpoint;

/// Result alias for the connection path
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors raised while acquiring, using, or closing a tracker connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The endpoint host resolved to no usable addresses
    #[error("tracker address {endpoint} did not resolve: {reason}")]
    Resolve {
        endpoint: TrackerEndpoint,
        reason: String,
    },

    /// TCP connect to the endpoint failed (refused, unreachable, ...)
    #[error("failed to connect to tracker {endpoint}: {source}")]
    Connect {
        endpoint: TrackerEndpoint,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete within the configured timeout
    #[error("connect to tracker {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        endpoint: TrackerEndpoint,
        timeout: Duration,
    },

    /// Shutting down the transport failed. The handle's transport slot is
    /// cleared before this is returned, so the handle is never left
    /// claiming a transport it no longer owns.
    #[error("failed to close tracker connection: {0}")]
    Close(#[source] io::Error),
}

impl ConnectionError {
    /// True for failures that happened while establishing a transport,
    /// either directly or through the pool.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            ConnectionError::Resolve { .. }
                | ConnectionError::Connect { .. }
                | ConnectionError::ConnectTimeout { .. }
        )
    }
}
