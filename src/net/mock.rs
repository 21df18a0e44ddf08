//! Scripted sockets and listeners for unit tests.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::net::connection::ClientSocket;
use crate::net::listener::{Acceptor, ListenerError};

#[derive(Debug, Default)]
struct Peer {
    /// Client → bridge.
    incoming: VecDeque<u8>,
    /// Bridge → client.
    received: Vec<u8>,
    hung_up: bool,
    send_limit: Option<usize>,
    fail_send: Option<io::ErrorKind>,
    fail_recv: Option<io::ErrorKind>,
}

/// One end held by the bridge, the clone held by the test acts as the client.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSocket(Arc<Mutex<Peer>>);

impl MockSocket {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Peer> {
        self.0.lock().unwrap()
    }

    pub(crate) fn client_send(&self, bytes: &[u8]) {
        self.lock().incoming.extend(bytes);
    }

    pub(crate) fn unread(&self) -> usize {
        self.lock().incoming.len()
    }

    pub(crate) fn received(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    pub(crate) fn hang_up(&self) {
        self.lock().hung_up = true;
    }

    pub(crate) fn set_send_limit(&self, limit: Option<usize>) {
        self.lock().send_limit = limit;
    }

    pub(crate) fn fail_next_send(&self, kind: io::ErrorKind) {
        self.lock().fail_send = Some(kind);
    }

    pub(crate) fn fail_next_recv(&self, kind: io::ErrorKind) {
        self.lock().fail_recv = Some(kind);
    }

    /// True once the bridge dropped its end.
    pub(crate) fn is_released(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }
}

impl ClientSocket for MockSocket {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut peer = self.lock();
        if let Some(kind) = peer.fail_recv.take() {
            return Err(io::Error::new(kind, "injected recv failure"));
        }
        if peer.incoming.is_empty() {
            return if peer.hung_up {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(peer.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(peer.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn try_send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut peer = self.lock();
        if let Some(kind) = peer.fail_send.take() {
            return Err(io::Error::new(kind, "injected send failure"));
        }
        let n = peer.send_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        if n == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        peer.received.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

#[derive(Debug, Default)]
struct Backlog {
    pending: VecDeque<(MockSocket, SocketAddr)>,
    next_port: u16,
    fail_accept: bool,
}

/// Listener whose backlog is filled by [`MockAcceptor::connect`].
#[derive(Debug, Clone, Default)]
pub(crate) struct MockAcceptor(Arc<Mutex<Backlog>>);

impl MockAcceptor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Simulate a client connecting; returns the client's end.
    pub(crate) fn connect(&self) -> MockSocket {
        let socket = MockSocket::new();
        let mut backlog = self.0.lock().unwrap();
        backlog.next_port += 1;
        let peer = SocketAddr::from(([10, 0, 0, 2], 40000 + backlog.next_port));
        backlog.pending.push_back((socket.clone(), peer));
        socket
    }

    pub(crate) fn fail_next_accept(&self) {
        self.0.lock().unwrap().fail_accept = true;
    }
}

impl Acceptor for MockAcceptor {
    type Socket = MockSocket;

    fn poll_new_connection(&mut self) -> Result<Option<(MockSocket, SocketAddr)>, ListenerError> {
        let mut backlog = self.0.lock().unwrap();
        if std::mem::take(&mut backlog.fail_accept) {
            return Err(ListenerError::Accept(io::ErrorKind::ConnectionAborted.into()));
        }
        Ok(backlog.pending.pop_front())
    }

    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 6638)))
    }
}
