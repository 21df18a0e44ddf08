//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (non-blocking accept, polled once per tick)
//!     → registry.rs (client set of one server instance)
//!     → connection.rs (state machine, inbound/outbound byte queues)
//!
//! Connection States:
//!     Connecting → Active → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - Accept backlog overflow is left to the kernel
//! - Socket errors end that connection only, never the server
//! - No framing or handshake: the socket is a transparent byte pipe

pub mod connection;
pub mod listener;
pub mod registry;

#[cfg(test)]
pub(crate) mod mock;

pub use connection::{
    ClientSocket, Connection, ConnectionError, ConnectionId, ConnectionState, DrainError,
    QueueLimits,
};
pub use listener::{Acceptor, Listener, ListenerError};
pub use registry::{ClientRegistry, Drained, PassStats};
