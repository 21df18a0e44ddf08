//! Serial stream server host binary.
//!
//! Loads the configuration, opens the UART, binds every configured port and
//! ticks the bridge until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use stream_server::config::{self, BridgeConfig, ConfigError};
use stream_server::lifecycle::{self, Shutdown};
use stream_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "stream-server")]
#[command(about = "Expose a serial port as a raw TCP stream", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configured one
    #[arg(short, long)]
    device: Option<String>,

    /// Log level, overrides the configured one (RUST_LOG wins over both)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("stream-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stream-server starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut bridge = match lifecycle::build_bridge(&config) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up bridge");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = bridge.on_start() {
        tracing::error!(error = %e, "Failed to start bridge");
        return ExitCode::FAILURE;
    }

    let shutdown = Shutdown::new();
    let ticks = shutdown.subscribe();
    lifecycle::spawn_signal_handler(shutdown.clone());

    bridge.run(config.scheduler.tick_interval(), ticks).await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Read the config file (or defaults) and apply command line overrides.
fn load(cli: &Cli) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let mut config = BridgeConfig::default();
            config.assign_ids();
            config
        }
    };

    if let Some(device) = &cli.device {
        config.serial.device = device.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    config::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
