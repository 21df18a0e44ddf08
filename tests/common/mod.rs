//! Shared utilities for integration tests.

use std::time::Duration;

use stream_server::bridge::BridgeScheduler;
use stream_server::config::{BridgeConfig, ServerConfig};
use stream_server::lifecycle::{build_with_transport, Shutdown};
use stream_server::net::Listener;
use stream_server::serial::MemoryTransport;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const TICK: Duration = Duration::from_millis(5);

/// Long enough for several ticks to run.
pub const SETTLE: Duration = Duration::from_millis(50);

pub const DEADLINE: Duration = Duration::from_secs(2);

/// A bridge ticking in the background on an in-memory UART.
pub struct RunningBridge {
    pub uart: MemoryTransport,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<BridgeScheduler<MemoryTransport, Listener>>,
}

impl RunningBridge {
    /// Stop ticking and hand back the scheduler.
    pub async fn stop(self) -> BridgeScheduler<MemoryTransport, Listener> {
        self.shutdown.trigger();
        tokio::time::timeout(DEADLINE, self.handle)
            .await
            .expect("bridge did not stop")
            .unwrap()
    }
}

/// Loopback-only server config on `port`.
pub fn server(id: &str, port: u16) -> ServerConfig {
    ServerConfig::new(id)
        .with_port(port)
        .with_bind_address("127.0.0.1")
}

/// Start a bridge with the given instances.
pub fn start_bridge(servers: Vec<ServerConfig>) -> RunningBridge {
    let mut config = BridgeConfig::default();
    config.servers = servers;

    let uart = MemoryTransport::new();
    let mut bridge = build_with_transport::<_, Listener>(&config, uart.clone()).unwrap();
    bridge.on_start().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(bridge.run(TICK, shutdown.subscribe()));

    RunningBridge {
        uart,
        shutdown,
        handle,
    }
}

/// Connect a client and give the bridge time to accept it.
pub async fn connect(port: u16) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    stream
}

/// Read exactly `n` bytes or panic after [`DEADLINE`].
pub async fn read_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0; n];
    tokio::time::timeout(DEADLINE, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for bytes")
        .unwrap();
    buf
}

/// Wait until the UART has received at least `n` bytes.
#[allow(dead_code)]
pub async fn wait_for_tx(uart: &MemoryTransport, n: usize) -> Vec<u8> {
    let deadline = tokio::time::Instant::now() + DEADLINE;
    loop {
        let tx = uart.tx();
        if tx.len() >= n || tokio::time::Instant::now() >= deadline {
            return tx;
        }
        tokio::time::sleep(TICK).await;
    }
}

/// True once the peer has closed the stream (EOF or reset).
#[allow(dead_code)]
pub async fn is_closed_by_peer(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    match tokio::time::timeout(DEADLINE, stream.read(&mut buf)).await {
        Ok(Ok(0)) | Ok(Err(_)) => true,
        Ok(Ok(_)) | Err(_) => false,
    }
}
