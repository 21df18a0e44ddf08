//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Open UART → Build stream servers → Scheduler
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Scheduler leaves its tick loop → on_stop closes everything
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Startup is all-or-nothing: a UART or bind failure is fatal
//! - Shutdown does not drain queues; pending bytes are discarded

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
pub use startup::{build_bridge, build_with_transport};
