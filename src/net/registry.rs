//! Client registry: the set of connections owned by one stream server.
//!
//! # Responsibilities
//! - Accept/close lifecycle of every connection (add, remove, reap)
//! - Fan serial bytes out to every active client
//! - Expose each client's pending bytes for the UART, in registry order
//!
//! Directions in the method names are seen from the UART: serial data is
//! *inbound* to the registry, client data is *outbound* toward the UART.

use std::net::SocketAddr;

use crate::net::connection::{
    ClientSocket, Connection, ConnectionError, ConnectionId, ConnectionState, DrainError,
    QueueLimits,
};

/// Totals from one pass over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Bytes moved.
    pub bytes: usize,
    /// Connections that failed and were marked for closing.
    pub failed: usize,
}

/// Connections of one server instance, in accept order.
#[derive(Debug)]
pub struct ClientRegistry<S> {
    server: String,
    limits: QueueLimits,
    connections: Vec<Connection<S>>,
}

impl<S: ClientSocket> ClientRegistry<S> {
    pub fn new(server: impl Into<String>, limits: QueueLimits) -> Self {
        Self {
            server: server.into(),
            limits,
            connections: Vec::new(),
        }
    }

    /// Register an accepted socket. It goes straight to `Active`.
    pub fn add(&mut self, socket: S, peer: SocketAddr) -> ConnectionId {
        let mut conn = Connection::new(socket, peer, self.limits);
        conn.activate();
        let id = conn.id();

        tracing::debug!(
            server = %self.server,
            connection_id = %id,
            peer = %peer,
            "New client connected"
        );

        self.connections.push(conn);
        id
    }

    /// Close and forget a connection immediately.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(index) = self.connections.iter().position(|c| c.id() == id) else {
            return false;
        };
        let mut conn = self.connections.remove(index);
        let discarded = conn.finish_close();
        tracing::debug!(
            server = %self.server,
            connection_id = %id,
            peer = %conn.peer(),
            discarded,
            "Client removed"
        );
        true
    }

    /// Visit every `Active` connection in registry order.
    pub fn for_each_active(&mut self, mut f: impl FnMut(&mut Connection<S>)) {
        self.connections
            .iter_mut()
            .filter(|c| c.is_active())
            .for_each(|c| f(c));
    }

    /// Copy `bytes` into every active client's outbound queue.
    ///
    /// Each client gets the identical byte run. Returns the total bytes lost
    /// to overflow across all clients.
    pub fn enqueue_inbound_for_all(&mut self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let mut lost = 0;
        self.for_each_active(|conn| lost += conn.enqueue_outbound(bytes));
        lost
    }

    /// Write up to `max` of a client's pending bytes through `write`.
    ///
    /// Returns `None` for an unknown or closed connection. Connections that
    /// are `Closing` still drain, so bytes received before a hang-up reach
    /// the UART.
    pub fn drain_outbound<E>(
        &mut self,
        id: ConnectionId,
        max: usize,
        write: impl FnMut(&[u8]) -> Result<usize, E>,
    ) -> Option<Result<Drained, DrainError<E>>> {
        let conn = self
            .connections
            .iter_mut()
            .find(|c| c.id() == id && c.state() != ConnectionState::Closed)?;

        Some(conn.drain_inbound(max, write).map(|written| Drained {
            written,
            remaining: conn.inbound_len(),
        }))
    }

    /// Read every active client's socket into its inbound queue.
    pub fn receive_all(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        for conn in self.connections.iter_mut().filter(|c| c.is_active()) {
            match conn.receive() {
                Ok(n) => stats.bytes += n,
                Err(e) => {
                    stats.failed += 1;
                    close_on_error(&self.server, conn, &e);
                }
            }
        }
        stats
    }

    /// Send every active client its queued serial bytes.
    pub fn flush_all(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        for conn in self.connections.iter_mut().filter(|c| c.is_active()) {
            match conn.flush() {
                Ok(n) => stats.bytes += n,
                Err(e) => {
                    stats.failed += 1;
                    close_on_error(&self.server, conn, &e);
                }
            }
        }
        stats
    }

    /// Finish closing every drained `Closing` connection and drop the closed
    /// ones. A `Closing` connection with client bytes still queued for the
    /// UART stays until they are written. Returns how many were removed.
    pub fn reap(&mut self) -> usize {
        let before = self.connections.len();
        for conn in &mut self.connections {
            if conn.state() == ConnectionState::Closing && conn.inbound_len() == 0 {
                let discarded = conn.finish_close();
                if discarded > 0 {
                    tracing::debug!(
                        server = %self.server,
                        connection_id = %conn.id(),
                        discarded,
                        "Discarded bytes of closed client"
                    );
                }
            }
        }
        self.connections.retain(|c| c.state() != ConnectionState::Closed);
        before - self.connections.len()
    }

    /// Close every connection and discard all queued bytes.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        for conn in &mut self.connections {
            conn.finish_close();
        }
        self.connections.clear();
        count
    }

    /// Connection ids in registry order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(Connection::id).collect()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<S>> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.connections.iter().filter(|c| c.is_active()).count()
    }
}

/// Outcome of [`ClientRegistry::drain_outbound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    /// Bytes the UART accepted.
    pub written: usize,
    /// Bytes still queued for this client.
    pub remaining: usize,
}

fn close_on_error<S: ClientSocket>(server: &str, conn: &mut Connection<S>, err: &ConnectionError) {
    match err {
        ConnectionError::PeerClosed => tracing::debug!(
            server = %server,
            connection_id = %conn.id(),
            peer = %conn.peer(),
            "Client disconnected"
        ),
        _ => tracing::warn!(
            server = %server,
            connection_id = %conn.id(),
            peer = %conn.peer(),
            error = %err,
            "Client connection failed"
        ),
    }
    conn.begin_close();
}
