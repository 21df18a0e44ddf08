//! Serial transport subsystem.
//!
//! # Data Flow
//! ```text
//! UART peripheral
//!     → transport.rs (non-blocking read_available / partial write contract)
//!     → uart.rs (real device via the serialport crate)
//!     → memory.rs (scripted in-memory device for tests and dry runs)
//! ```
//!
//! # Design Decisions
//! - One transport instance owns the device; the scheduler owns the transport
//!   and uses it on behalf of every server instance
//! - No call blocks: reads return what is pending, writes return what the
//!   device accepted
//! - Failures are reported, never retried here; the scheduler decides

pub mod memory;
pub mod transport;
pub mod uart;

pub use memory::MemoryTransport;
pub use transport::{SerialTransport, TransportError};
pub use uart::UartTransport;
