//! Real UART backend built on the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::config::SerialConfig;
use crate::serial::transport::{is_transient, SerialTransport, TransportError};

/// Writes give up immediately instead of waiting for FIFO space.
const IO_TIMEOUT: Duration = Duration::ZERO;

/// A host serial device opened in non-blocking mode.
pub struct UartTransport {
    port: Box<dyn SerialPort>,
    device: String,
}

impl UartTransport {
    /// Open the configured device.
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(config.device.as_str(), config.baud_rate)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                device: config.device.clone(),
                source,
            })?;

        tracing::info!(
            device = %config.device,
            baud_rate = config.baud_rate,
            "Serial device opened"
        );

        Ok(Self {
            port,
            device: config.device.clone(),
        })
    }

    /// Device path this transport was opened on.
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl SerialTransport for UartTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::Read(e.into()))? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = pending.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(TransportError::Read(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if data.is_empty() {
            return Ok(0);
        }
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(TransportError::Write(e)),
        }
    }
}

impl std::fmt::Debug for UartTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartTransport")
            .field("device", &self.device)
            .finish()
    }
}
