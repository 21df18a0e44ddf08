//! Startup orchestration.
//!
//! # Responsibilities
//! - Re-check the configuration as a whole
//! - Open the UART
//! - Build one stream server per configured instance, all sharing the UART
//!
//! Listeners are not bound here; `BridgeScheduler::on_start` does that.

use crate::bridge::{BridgeError, BridgeScheduler, StreamServer};
use crate::config::{validate_config, BridgeConfig, ConfigError};
use crate::net::{Acceptor, Listener};
use crate::serial::{SerialTransport, UartTransport};

/// Open the configured UART and build the scheduler around it.
pub fn build_bridge(
    config: &BridgeConfig,
) -> Result<BridgeScheduler<UartTransport, Listener>, BridgeError> {
    validate_config(config).map_err(ConfigError::Validation)?;
    let serial = UartTransport::open(&config.serial)?;
    build_with_transport(config, serial)
}

/// Build the scheduler around an already opened transport.
pub fn build_with_transport<T: SerialTransport, A: Acceptor>(
    config: &BridgeConfig,
    serial: T,
) -> Result<BridgeScheduler<T, A>, BridgeError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let servers = config
        .servers
        .iter()
        .cloned()
        .map(StreamServer::new)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        device = %config.serial.device,
        baud_rate = config.serial.baud_rate,
        servers = servers.len(),
        framework_version = %config.framework_version,
        "Bridge configured"
    );

    Ok(BridgeScheduler::with_read_chunk(
        serial,
        servers,
        config.serial.read_chunk,
    ))
}
