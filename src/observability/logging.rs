//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Let `RUST_LOG` override the configured level
//! - Render serial payloads for debug output

use std::fmt::Write;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest payload prefix rendered by [`hex_preview`].
pub const PREVIEW_LIMIT: usize = 128;

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stream_server={level}")));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Space-separated upper-case hex of the first [`PREVIEW_LIMIT`] bytes,
/// with a trailing `..` when the payload was cut.
pub fn hex_preview(data: &[u8]) -> String {
    let shown = &data[..data.len().min(PREVIEW_LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3 + 2);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    if data.len() > PREVIEW_LIMIT {
        out.push_str(" ..");
    }
    out
}
