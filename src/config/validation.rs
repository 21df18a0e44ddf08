//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports 1-65535, non-zero buffers)
//! - Detect duplicate ids and conflicting listen endpoints
//! - Enforce the minimum host framework version
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BridgeConfig, FrameworkVersion, ServerConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server '{id}': port must be between 1 and 65535")]
    InvalidPort { id: String },

    #[error("server id '{0}' must start with a letter or '_' and contain only letters, digits and '_'")]
    InvalidId(String),

    #[error("duplicate server id '{0}'")]
    DuplicateId(String),

    #[error("server '{id}': invalid bind address '{address}'")]
    InvalidBindAddress { id: String, address: String },

    #[error("servers '{first}' and '{second}' both listen on {addr}")]
    DuplicateEndpoint {
        first: String,
        second: String,
        addr: SocketAddr,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("serial device path is empty")]
    EmptyDevice,

    #[error("invalid framework version '{0}'")]
    InvalidFrameworkVersion(String),

    #[error("framework version {found} is older than the required {required}")]
    UnsupportedFrameworkVersion {
        found: FrameworkVersion,
        required: FrameworkVersion,
    },
}

/// Validate a complete bridge configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.framework_version.parse::<FrameworkVersion>() {
        Ok(found) if found < FrameworkVersion::MINIMUM => {
            errors.push(ValidationError::UnsupportedFrameworkVersion {
                found,
                required: FrameworkVersion::MINIMUM,
            });
        }
        Ok(_) => {}
        Err(()) => errors.push(ValidationError::InvalidFrameworkVersion(
            config.framework_version.clone(),
        )),
    }

    if config.serial.device.trim().is_empty() {
        errors.push(ValidationError::EmptyDevice);
    }
    if config.serial.baud_rate == 0 {
        errors.push(zero("serial.baud_rate"));
    }
    if config.serial.read_chunk == 0 {
        errors.push(zero("serial.read_chunk"));
    }
    if config.scheduler.tick_interval_ms == 0 {
        errors.push(zero("scheduler.tick_interval_ms"));
    }

    let mut seen_ids: Vec<&str> = Vec::new();
    let mut endpoints: Vec<(&str, SocketAddr)> = Vec::new();

    for server in &config.servers {
        errors.extend(validate_server(server));

        if seen_ids.contains(&server.id.as_str()) {
            errors.push(ValidationError::DuplicateId(server.id.clone()));
        } else {
            seen_ids.push(&server.id);
        }

        if let Ok(addr) = server.socket_addr() {
            if let Some((first, _)) = endpoints.iter().find(|(_, other)| overlaps(*other, addr)) {
                errors.push(ValidationError::DuplicateEndpoint {
                    first: first.to_string(),
                    second: server.id.clone(),
                    addr,
                });
            }
            endpoints.push((&server.id, addr));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one server block in isolation.
pub fn validate_server(server: &ServerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !is_identifier(&server.id) {
        errors.push(ValidationError::InvalidId(server.id.clone()));
    }
    if server.port == 0 {
        errors.push(ValidationError::InvalidPort {
            id: server.id.clone(),
        });
    }
    if server.socket_addr().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            id: server.id.clone(),
            address: server.bind_address.clone(),
        });
    }
    if server.buffer_size == 0 {
        errors.push(zero(format!("servers.{}.buffer_size", server.id)));
    }
    if server.inbound_buffer_size == 0 {
        errors.push(zero(format!("servers.{}.inbound_buffer_size", server.id)));
    }
    if server.backlog == 0 {
        errors.push(zero(format!("servers.{}.backlog", server.id)));
    }

    errors
}

fn zero(field: impl Into<String>) -> ValidationError {
    ValidationError::Zero {
        field: field.into(),
    }
}

fn is_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Two endpoints collide when they share a port and either address is a
/// wildcard or both are the same.
fn overlaps(a: SocketAddr, b: SocketAddr) -> bool {
    a.port() == b.port() && (a.ip() == b.ip() || a.ip().is_unspecified() || b.ip().is_unspecified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerConfig;

    #[test]
    fn default_config_is_valid() {
        let mut config = BridgeConfig::default();
        config.assign_ids();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn port_zero_is_rejected() {
        let errors = validate_server(&ServerConfig::new("uart").with_port(0));
        assert_eq!(
            errors,
            vec![ValidationError::InvalidPort { id: "uart".into() }]
        );
    }

    #[test]
    fn all_errors_are_reported() {
        let mut config = BridgeConfig::default();
        config.framework_version = "2021.12.0".into();
        config.scheduler.tick_interval_ms = 0;
        config.servers = vec![
            ServerConfig::new("a"),
            ServerConfig::new("a").with_port(7000),
            ServerConfig::new("b").with_bind_address("127.0.0.1"),
            ServerConfig::new("9lives").with_port(7001).with_bind_address("nowhere"),
        ];

        let errors = validate_config(&config).unwrap_err();

        assert!(errors.contains(&ValidationError::UnsupportedFrameworkVersion {
            found: FrameworkVersion::new(2021, 12, 0),
            required: FrameworkVersion::MINIMUM,
        }));
        assert!(errors.contains(&zero("scheduler.tick_interval_ms")));
        assert!(errors.contains(&ValidationError::DuplicateId("a".into())));
        assert!(errors.contains(&ValidationError::DuplicateEndpoint {
            first: "a".into(),
            second: "b".into(),
            addr: "127.0.0.1:6638".parse().unwrap(),
        }));
        assert!(errors.contains(&ValidationError::InvalidId("9lives".into())));
        assert!(errors.contains(&ValidationError::InvalidBindAddress {
            id: "9lives".into(),
            address: "nowhere".into(),
        }));
    }

    #[test]
    fn distinct_addresses_may_share_a_port() {
        let mut config = BridgeConfig::default();
        config.servers = vec![
            ServerConfig::new("lan").with_bind_address("192.168.1.10"),
            ServerConfig::new("local").with_bind_address("127.0.0.1"),
        ];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn unparsable_framework_version_is_reported() {
        let mut config = BridgeConfig::default();
        config.assign_ids();
        config.framework_version = "latest".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidFrameworkVersion("latest".into())])
        );
    }
}
