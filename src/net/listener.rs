//! TCP listener polled from the cooperative tick.
//!
//! # Responsibilities
//! - Bind to the configured address and port
//! - Hand out newly accepted connections without ever waiting
//! - Leave backlog overflow to the network stack
//!
//! # Design Decisions
//! - The socket lives on the Tokio reactor, but accepts are polled with a
//!   no-op waker: the scheduler calls again on the next tick instead of
//!   being woken
//! - Listen backlog comes from the server config (default 8)

use std::io;
use std::net::SocketAddr;
use std::task::{Context, Poll};

use futures_util::task::noop_waker_ref;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::net::connection::ClientSocket;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The configured bind address does not parse.
    #[error("Invalid bind address '{0}'")]
    InvalidAddress(String),

    /// Binding needs a Tokio runtime to register the socket with.
    #[error("Failed to bind {0}: no Tokio runtime is running")]
    NoRuntime(SocketAddr),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// Source of new client sockets.
pub trait Acceptor {
    type Socket: ClientSocket;

    /// Return the next pending connection, or `None` if there is none yet.
    fn poll_new_connection(&mut self) -> Result<Option<(Self::Socket, SocketAddr)>, ListenerError>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr, ListenerError>;
}

/// A non-blocking TCP listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind `addr` with the given listen backlog.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn bind(addr: SocketAddr, backlog: u32) -> Result<Self, ListenerError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ListenerError::NoRuntime(addr));
        }

        let bind_err = |source: io::Error| ListenerError::Bind { addr, source };
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        };
        let socket = socket.map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let inner = socket.listen(backlog).map_err(bind_err)?;

        let local_addr = inner.local_addr().map_err(bind_err)?;
        tracing::info!(
            address = %local_addr,
            backlog,
            "Listener bound"
        );

        Ok(Self { inner })
    }
}

impl Acceptor for Listener {
    type Socket = TcpStream;

    fn poll_new_connection(&mut self) -> Result<Option<(TcpStream, SocketAddr)>, ListenerError> {
        let mut cx = Context::from_waker(noop_waker_ref());
        match self.inner.poll_accept(&mut cx) {
            Poll::Ready(Ok((stream, peer))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(peer_addr = %peer, error = %e, "Failed to disable Nagle");
                }
                Ok(Some((stream, peer)))
            }
            Poll::Ready(Err(e)) => Err(ListenerError::Accept(e)),
            Poll::Pending => Ok(None),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.inner.local_addr().map_err(ListenerError::Accept)
    }
}
