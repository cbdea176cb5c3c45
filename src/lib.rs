//! Storlink Library
//!
//! Tracker connection layer for a distributed storage client: connection
//! handles with lazy acquisition, optional transport pooling, and
//! liveness/availability checks over persistent TCP sockets.

pub mod config;
pub mod error;
pub mod pool;
pub mod tracker;

pub use config::ClientConfig;
pub use error::ConnectionError;
pub use pool::ConnectionPool;
pub use tracker::{ConnectionSettings, TrackerConnection, TrackerEndpoint};
