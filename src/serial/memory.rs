//! In-memory serial transport.
//!
//! Behaves like a UART whose far side is driven by code: bytes pushed with
//! [`MemoryTransport::push_rx`] become readable, bytes the bridge writes are
//! captured per call. Clones share the same device, so a test can keep one
//! handle while the scheduler owns another.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::serial::transport::{SerialTransport, TransportError};

#[derive(Debug, Default)]
struct DeviceState {
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    write_limit: Option<usize>,
    fail_read: Option<io::ErrorKind>,
    /// Writes still allowed to succeed, then the failure to inject.
    fail_write: Option<(usize, io::ErrorKind)>,
}

/// A scripted UART shared between the bridge and the test driving it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<DeviceState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `bytes` readable, as if the attached device had sent them.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes);
    }

    /// Bytes pushed but not yet read by the bridge.
    pub fn pending_rx(&self) -> usize {
        self.lock().rx.len()
    }

    /// Everything written to the device so far, concatenated.
    pub fn tx(&self) -> Vec<u8> {
        self.lock().writes.concat()
    }

    /// The accepted part of each write call, in call order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Clear and return the captured transmit stream.
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().writes).concat()
    }

    /// Accept at most `limit` bytes per write call; `None` removes the cap.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.lock().write_limit = limit;
    }

    /// Fail the next read with an I/O error of `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.lock().fail_read = Some(kind);
    }

    /// Fail the next write with an I/O error of `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.fail_write_after(0, kind);
    }

    /// Let `calls` more writes through, then fail one with `kind`.
    pub fn fail_write_after(&self, calls: usize, kind: io::ErrorKind) {
        self.lock().fail_write = Some((calls, kind));
    }
}

impl SerialTransport for MemoryTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        if let Some(kind) = state.fail_read.take() {
            return Err(TransportError::Read(io::Error::new(kind, "injected read failure")));
        }

        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        let pending = state.fail_write;
        match pending {
            Some((0, kind)) => {
                state.fail_write = None;
                return Err(TransportError::Write(io::Error::new(kind, "injected write failure")));
            }
            Some((calls, kind)) => state.fail_write = Some((calls - 1, kind)),
            None => {}
        }

        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        if n > 0 {
            state.writes.push(data[..n].to_vec());
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_return_pushed_bytes_in_order() {
        let device = MemoryTransport::new();
        let mut transport = device.clone();
        device.push_rx(b"hello");

        let mut buf = [0u8; 3];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(transport.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_limit_forces_partial_writes() {
        let device = MemoryTransport::new();
        let mut transport = device.clone();
        device.set_write_limit(Some(2));

        assert_eq!(transport.write(b"abc").unwrap(), 2);
        device.set_write_limit(Some(0));
        assert_eq!(transport.write(b"c").unwrap(), 0);
        device.set_write_limit(None);
        assert_eq!(transport.write(b"c").unwrap(), 1);

        assert_eq!(device.writes(), vec![b"ab".to_vec(), b"c".to_vec()]);
        assert_eq!(device.take_tx(), b"abc");
        assert!(device.tx().is_empty());
    }

    #[test]
    fn injected_failures_fire_once() {
        let device = MemoryTransport::new();
        let mut transport = device.clone();
        device.push_rx(b"x");
        device.fail_next_read(io::ErrorKind::BrokenPipe);
        device.fail_next_write(io::ErrorKind::BrokenPipe);

        let mut buf = [0u8; 4];
        assert!(matches!(transport.read_available(&mut buf), Err(TransportError::Read(_))));
        assert_eq!(transport.read_available(&mut buf).unwrap(), 1);
        assert!(matches!(transport.write(b"y"), Err(TransportError::Write(_))));
        assert_eq!(transport.write(b"y").unwrap(), 1);
    }

    #[test]
    fn poisoned_handle_keeps_working() {
        let device = MemoryTransport::new();
        let holder = device.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.state.lock().unwrap();
            panic!("test thread dies holding the lock");
        })
        .join();

        device.push_rx(b"x");
        assert_eq!(device.pending_rx(), 1);
    }

    #[test]
    fn write_failure_can_be_deferred() {
        let device = MemoryTransport::new();
        let mut transport = device.clone();
        device.fail_write_after(2, io::ErrorKind::BrokenPipe);

        assert_eq!(transport.write(b"a").unwrap(), 1);
        assert_eq!(transport.write(b"b").unwrap(), 1);
        assert!(matches!(transport.write(b"c"), Err(TransportError::Write(_))));
        assert_eq!(transport.write(b"c").unwrap(), 1);
        assert_eq!(device.tx(), b"abc");
    }
}
