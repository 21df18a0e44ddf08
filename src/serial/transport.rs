//! The byte-level contract every UART backend implements.

use std::io;

use thiserror::Error;

/// Errors raised by a serial transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device could not be opened.
    #[error("failed to open serial device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: serialport::Error,
    },

    /// Reading pending bytes failed.
    #[error("serial read failed: {0}")]
    Read(#[source] io::Error),

    /// Handing bytes to the device failed.
    #[error("serial write failed: {0}")]
    Write(#[source] io::Error),
}

/// A transparent byte pipe to a UART.
///
/// Both operations must return immediately. The bridge calls them from a
/// cooperative tick and never retries within the same tick.
pub trait SerialTransport {
    /// Copy bytes that are already pending into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is available.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Offer `data` to the device and return how many leading bytes it took.
    ///
    /// Partial acceptance is the normal case when the transmit FIFO is busy;
    /// the caller keeps the rest.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;
}

/// `true` for error kinds that only mean "no progress right now".
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
