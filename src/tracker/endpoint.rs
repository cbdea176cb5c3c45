//! Tracker Endpoints

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tracker endpoint as configured: a host name or IP literal plus a port.
///
/// The host is kept in its textual form and resolved at dial time, so a
/// DNS name that moves between acquisitions keeps working. Endpoints are
/// the key the connection pool caches transports under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackerEndpoint {
    host: String,
    port: u16,
}

/// Error returned when an endpoint string cannot be parsed
#[derive(Debug, Error)]
#[error("invalid tracker endpoint '{input}': {reason}")]
pub struct EndpointParseError {
    input: String,
    reason: &'static str,
}

impl TrackerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for TrackerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for TrackerEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| EndpointParseError {
            input: s.to_string(),
            reason,
        };

        // Bracketed form for IPv6 literals: [::1]:22122
        let (host, port_str) = if let Some(rest) = s.strip_prefix('[') {
            rest.split_once("]:")
                .ok_or_else(|| err("expected '[host]:port'"))?
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(|| err("missing port"))?;
            if host.contains(':') {
                return Err(err("IPv6 literals must be bracketed"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(err("empty host"));
        }
        let port = port_str.parse::<u16>().map_err(|_| err("invalid port"))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for TrackerEndpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackerEndpoint> for String {
    fn from(endpoint: TrackerEndpoint) -> Self {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let ep: TrackerEndpoint = "tracker1:22122".parse().unwrap();
        assert_eq!(ep.host(), "tracker1");
        assert_eq!(ep.port(), 22122);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let ep: TrackerEndpoint = "[::1]:22122".parse().unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.port(), 22122);
        assert_eq!(ep.to_string(), "[::1]:22122");
    }

    #[test]
    fn rejects_malformed_endpoints() {
        assert!("tracker1".parse::<TrackerEndpoint>().is_err());
        assert!(":22122".parse::<TrackerEndpoint>().is_err());
        assert!("tracker1:notaport".parse::<TrackerEndpoint>().is_err());
        assert!("::1:22122".parse::<TrackerEndpoint>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let ep = TrackerEndpoint::new("tracker1", 22122);
        let parsed: TrackerEndpoint = ep.to_string().parse().unwrap();
        assert_eq!(ep, parsed);
    }
}
