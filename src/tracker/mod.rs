//! Tracker Connection Module
//!
//! Handles tracker endpoint addressing, dialing, and connection lifecycle.

pub mod connection;
pub mod dial;
pub mod endpoint;

pub use connection::{ConnectionSettings, TrackerConnection};
pub use endpoint::TrackerEndpoint;
