//! Bridge subsystem: moves bytes between the UART and TCP clients.
//!
//! # Data Flow
//! ```text
//! UART ──read──▶ scheduler ──broadcast──▶ every server's registry ──▶ sockets
//! UART ◀─write── scheduler ◀─lease/FCFS── client inbound queues  ◀── sockets
//! ```
//!
//! # Design Decisions
//! - Single-threaded cooperative ticks; nothing in a tick waits on I/O
//! - One UART, any number of server instances
//! - A slow client loses its oldest serial bytes; a fast UART never waits

pub mod queue;
pub mod scheduler;
pub mod server;

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::ListenerError;
use crate::serial::TransportError;

pub use queue::ByteQueue;
pub use scheduler::{BridgeScheduler, SchedulerState, TickReport};
pub use server::StreamServer;

/// Errors that stop the bridge from starting.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Stream server '{server}' failed to start: {source}")]
    Listener {
        server: String,
        #[source]
        source: ListenerError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
