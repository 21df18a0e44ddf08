//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port a server listens on when the config block does not name one.
pub const DEFAULT_PORT: u16 = 6638;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Host framework version this file was written against.
    pub framework_version: String,

    /// The shared UART.
    pub serial: SerialConfig,

    /// One entry per stream server instance. Every instance shares `serial`.
    pub servers: Vec<ServerConfig>,

    /// Cooperative tick loop settings.
    pub scheduler: SchedulerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            framework_version: FrameworkVersion::CURRENT.to_string(),
            serial: SerialConfig::default(),
            servers: vec![ServerConfig::default()],
            scheduler: SchedulerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Fill in generated ids for server blocks that did not declare one.
    ///
    /// The first anonymous block becomes `stream_server`, later ones get an
    /// index suffix.
    pub fn assign_ids(&mut self) {
        for (index, server) in self.servers.iter_mut().enumerate() {
            if server.id.trim().is_empty() {
                server.id = if index == 0 {
                    "stream_server".to_string()
                } else {
                    format!("stream_server_{}", index)
                };
            }
        }
    }
}

/// Serial device configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyUSB0").
    pub device: String,

    /// Line speed.
    pub baud_rate: u32,

    /// Bytes requested from the UART per read call.
    pub read_chunk: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_chunk: 256,
        }
    }
}

/// A single stream server instance (one TCP port).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Instance identifier, unique across the config.
    pub id: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Local address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Per-client capacity of the serial → network queue.
    pub buffer_size: usize,

    /// Per-client capacity of the network → serial queue.
    pub inbound_buffer_size: usize,

    /// Listen backlog. Connection attempts beyond it are refused by the
    /// network stack; accepted clients are not capped.
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            buffer_size: 1024,
            inbound_buffer_size: 256,
            backlog: 8,
        }
    }
}

impl ServerConfig {
    /// Build a config for `id` with every other field defaulted.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder-style port override.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder-style bind address override.
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// The socket address the listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.bind_address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Cooperative scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay between two ticks in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 10 }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A `MAJOR.MINOR.PATCH` host framework version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameworkVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl FrameworkVersion {
    /// Oldest framework release the stream server component supports.
    pub const MINIMUM: FrameworkVersion = FrameworkVersion::new(2022, 3, 0);

    /// Framework release this host implements.
    pub const CURRENT: FrameworkVersion = FrameworkVersion::new(2024, 6, 0);

    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FrameworkVersion {
    type Err = ();

    /// Accepts `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u16, ()> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| ()),
                None if required => Err(()),
                None => Ok(0),
            }
        };
        let version = Self::new(next(true)?, next(true)?, next(false)?);
        if parts.next().is_some() {
            return Err(());
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_listens_on_6638() {
        let server = ServerConfig::default();
        assert_eq!(server.port, DEFAULT_PORT);
        assert_eq!(
            server.socket_addr().unwrap(),
            "0.0.0.0:6638".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn assign_ids_fills_only_anonymous_blocks() {
        let mut config = BridgeConfig {
            servers: vec![
                ServerConfig::default(),
                ServerConfig::new("modem"),
                ServerConfig::default(),
            ],
            ..BridgeConfig::default()
        };
        config.assign_ids();

        let ids: Vec<_> = config.servers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["stream_server", "modem", "stream_server_2"]);
    }

    #[test]
    fn framework_version_parsing_and_order() {
        assert_eq!(
            "2022.3".parse::<FrameworkVersion>(),
            Ok(FrameworkVersion::new(2022, 3, 0))
        );
        assert_eq!(
            "2023.12.1".parse::<FrameworkVersion>(),
            Ok(FrameworkVersion::new(2023, 12, 1))
        );
        assert!("2023".parse::<FrameworkVersion>().is_err());
        assert!("2023.1.2.3".parse::<FrameworkVersion>().is_err());
        assert!("v2023.1".parse::<FrameworkVersion>().is_err());

        assert!(FrameworkVersion::new(2022, 2, 9) < FrameworkVersion::MINIMUM);
        assert!(FrameworkVersion::CURRENT >= FrameworkVersion::MINIMUM);
    }
}
