//! Serial stream server.
//!
//! Exposes one UART as a raw TCP byte stream. Every connected client sees
//! everything the UART emits; whatever any client sends is written to the
//! UART.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                    STREAM SERVER                     │
//!                   │                                                      │
//!   ┌────────┐      │  ┌─────────┐   ┌────────────┐   ┌─────────────────┐  │     TCP clients
//!   │  UART  │◀────▶│  │ serial  │◀─▶│   bridge   │◀─▶│ net: registry + │◀─┼──▶ (port 6638, ...)
//!   └────────┘      │  │transport│   │ scheduler  │   │  connections    │  │
//!                   │  └─────────┘   └─────┬──────┘   └───────▲─────────┘  │
//!                   │                      │ tick             │ accept     │
//!                   │                      ▼                  │            │
//!                   │               ┌─────────────┐     ┌─────┴─────┐      │
//!                   │               │  lifecycle  │     │ listener  │      │
//!                   │               │start / stop │     │ (per port)│      │
//!                   │               └─────────────┘     └───────────┘      │
//!                   │                                                      │
//!                   │  ┌────────────────────────────────────────────────┐  │
//!                   │  │ config (TOML) · observability (tracing/metrics)│  │
//!                   │  └────────────────────────────────────────────────┘  │
//!                   └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod bridge;
pub mod config;
pub mod net;
pub mod serial;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use bridge::{BridgeError, BridgeScheduler, StreamServer, TickReport};
pub use config::{BridgeConfig, ServerConfig};
pub use lifecycle::Shutdown;
pub use serial::{MemoryTransport, SerialTransport, UartTransport};
