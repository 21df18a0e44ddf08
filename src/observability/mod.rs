//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, serial hex previews)
//!     → metrics.rs (client gauges, byte counters)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (optional Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with `server` and `connection_id` fields
//! - Metrics are cheap (no-ops until an exporter is installed)

pub mod logging;
pub mod metrics;
