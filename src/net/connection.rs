//! Connection state machine and per-client buffering.
//!
//! # Responsibilities
//! - Track connection state (Connecting → Active → Closing → Closed)
//! - Generate unique connection IDs for tracing
//! - Own the client socket and both byte queues
//! - Move bytes between socket and queues without blocking

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::bridge::queue::ByteQueue;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Bytes pulled from a socket per read call.
const RECV_CHUNK: usize = 512;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, not yet registered for traffic.
    Connecting,
    /// Exchanging bytes in both directions.
    Active,
    /// Failed or hung up. Nothing more is read from or sent to the client;
    /// bytes it already sent still drain to the UART.
    Closing,
    /// Socket released, waiting to be reaped.
    Closed,
}

/// Failure on a single client socket. Terminal for that connection only.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// A UART write failed part way through [`Connection::drain_inbound`].
#[derive(Debug)]
pub struct DrainError<E> {
    /// Bytes handed on before the failure.
    pub written: usize,
    pub source: E,
}

/// Non-blocking byte socket as seen by the bridge.
pub trait ClientSocket {
    /// Read pending bytes. `Ok(0)` means the peer hung up; `WouldBlock`
    /// means nothing is pending.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send as much of `buf` as the socket takes without waiting.
    fn try_send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl ClientSocket for tokio::net::TcpStream {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf)
    }

    fn try_send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.try_write(buf)
    }
}

/// Capacities of the two per-connection queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Client → serial.
    pub inbound: usize,
    /// Serial → client.
    pub outbound: usize,
}

/// One accepted client.
#[derive(Debug)]
pub struct Connection<S> {
    id: ConnectionId,
    peer: SocketAddr,
    socket: Option<S>,
    inbound: ByteQueue,
    outbound: ByteQueue,
    state: ConnectionState,
    dropped: u64,
}

impl<S: ClientSocket> Connection<S> {
    /// Wrap a freshly accepted socket. The connection starts in `Connecting`.
    pub fn new(socket: S, peer: SocketAddr, limits: QueueLimits) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            socket: Some(socket),
            inbound: ByteQueue::with_capacity(limits.inbound),
            outbound: ByteQueue::with_capacity(limits.outbound),
            state: ConnectionState::Connecting,
            dropped: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, used as the client identifier in logs.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnectionState::Active
    }

    /// Bytes from the client still waiting for the UART.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes from the UART still waiting for the client.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Serial bytes this client lost to outbound overflow.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }

    /// Start exchanging traffic. There is no handshake.
    pub fn activate(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Active;
        }
    }

    /// Pull whatever the client has sent into the inbound queue.
    ///
    /// Stops when the socket has nothing more or the queue is full; a full
    /// queue leaves the rest in the kernel buffer. Returns bytes read.
    pub fn receive(&mut self) -> Result<usize, ConnectionError> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(0);
        };

        let mut chunk = [0u8; RECV_CHUNK];
        let mut total = 0;
        loop {
            let want = self.inbound.free().min(chunk.len());
            if want == 0 {
                return Ok(total);
            }
            match socket.try_recv(&mut chunk[..want]) {
                Ok(0) => return Err(ConnectionError::PeerClosed),
                Ok(n) => {
                    self.inbound.push_bounded(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Read(e)),
            }
        }
    }

    /// Queue serial bytes for the client, overwriting the oldest on overflow.
    /// Returns how many bytes were lost.
    pub fn enqueue_outbound(&mut self, data: &[u8]) -> usize {
        let lost = self.outbound.push_overwrite(data);
        if lost > 0 {
            if self.dropped == 0 {
                tracing::warn!(
                    connection_id = %self.id,
                    peer = %self.peer,
                    capacity = self.outbound.capacity(),
                    "Client is not keeping up, dropping oldest serial bytes"
                );
            }
            self.dropped += lost as u64;
        }
        lost
    }

    /// Hand queued client bytes to `write` (the UART), at most `max` bytes.
    ///
    /// `write` returns how many leading bytes it accepted; anything it leaves
    /// stays queued in order. Stops at the first short write. A failing
    /// `write` still reports what earlier calls handed on.
    pub fn drain_inbound<E>(
        &mut self,
        max: usize,
        mut write: impl FnMut(&[u8]) -> Result<usize, E>,
    ) -> Result<usize, DrainError<E>> {
        let mut written = 0;
        while written < max && !self.inbound.is_empty() {
            let front = self.inbound.front();
            let chunk = &front[..front.len().min(max - written)];
            let chunk_len = chunk.len();

            let accepted = match write(chunk) {
                Ok(n) => n.min(chunk_len),
                Err(source) => return Err(DrainError { written, source }),
            };
            self.inbound.consume(accepted);
            written += accepted;
            if accepted < chunk_len {
                break;
            }
        }
        Ok(written)
    }

    /// Send queued serial bytes to the client. Partial sends keep the rest.
    pub fn flush(&mut self) -> Result<usize, ConnectionError> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(0);
        };

        let mut total = 0;
        while !self.outbound.is_empty() {
            match socket.try_send(self.outbound.front()) {
                Ok(0) => return Err(ConnectionError::PeerClosed),
                Ok(n) => {
                    self.outbound.consume(n);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Write(e)),
            }
        }
        Ok(total)
    }

    /// Active → Closing. No-op in any other state.
    pub fn begin_close(&mut self) {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Active) {
            self.state = ConnectionState::Closing;
        }
    }

    /// Release the socket and discard queued bytes. Returns bytes discarded.
    pub fn finish_close(&mut self) -> usize {
        self.socket = None;
        self.state = ConnectionState::Closed;
        self.inbound.clear() + self.outbound.clear()
    }
}
