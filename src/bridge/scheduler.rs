//! Bridge scheduler: one cooperative step function driving every instance.
//!
//! # Tick order
//! ```text
//! 1. accept     listener → registry (every instance)
//! 2. fan-out    UART → every active client's outbound queue (every instance)
//! 3. fan-in     client sockets → inbound queues → UART, registry order
//! 4. flush      outbound queues → client sockets
//! 5. reap       drained Closing → Closed → removed
//! ```
//!
//! # Serial arbitration
//! Instances share one UART. Clients are served first-come-first-served in
//! instance order, then registry order. When the UART takes only part of a
//! client's pending bytes, that client holds a lease on the line: fan-in stops
//! for the tick, and on later ticks the leaseholder writes the rest of that
//! span before anyone else. A client's byte run is therefore never split by
//! another client's bytes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::bridge::server::StreamServer;
use crate::bridge::BridgeError;
use crate::net::{
    Acceptor, ClientRegistry, ClientSocket, ConnectionId, DrainError, Listener, ListenerError,
};
use crate::observability::logging::hex_preview;
use crate::observability::metrics;
use crate::serial::{SerialTransport, TransportError};

/// Default UART read size when none is configured.
pub const DEFAULT_READ_CHUNK: usize = 256;

/// Upper bound on UART reads per tick; anything beyond waits for the next one.
pub const MAX_SERIAL_READS_PER_TICK: usize = 8;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Built, listeners not bound yet.
    Idle,
    /// Between `on_start` and `on_stop`.
    Running,
    /// Torn down; ticks do nothing.
    Stopped,
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub accepted: usize,
    /// Bytes read from the UART.
    pub serial_read: usize,
    /// Bytes written to the UART.
    pub serial_written: usize,
    /// Bytes sent to client sockets.
    pub sent_to_clients: usize,
    /// Serial bytes lost to outbound overflow, summed over clients.
    pub dropped: usize,
    /// Connections removed.
    pub closed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// A client mid-way through a span the UART has only partly taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SerialLease {
    server: usize,
    connection: ConnectionId,
    remaining: usize,
}

enum Span {
    /// Whole span written.
    Done(usize),
    /// UART saturated part way.
    Partial { written: usize, remaining: usize },
    /// Connection no longer exists.
    Gone,
    /// UART failed, possibly after taking part of the span.
    Failed {
        written: usize,
        remaining: usize,
        error: TransportError,
    },
}

pub struct BridgeScheduler<T, A: Acceptor> {
    serial: T,
    servers: Vec<StreamServer<A>>,
    state: SchedulerState,
    lease: Option<SerialLease>,
    chunk: Vec<u8>,
    rx: Vec<u8>,
}

impl<T: SerialTransport, A: Acceptor> BridgeScheduler<T, A> {
    /// Take ownership of the UART and the instances that share it.
    pub fn new(serial: T, servers: Vec<StreamServer<A>>) -> Self {
        Self::with_read_chunk(serial, servers, DEFAULT_READ_CHUNK)
    }

    pub fn with_read_chunk(serial: T, servers: Vec<StreamServer<A>>, read_chunk: usize) -> Self {
        let read_chunk = read_chunk.max(1);
        Self {
            serial,
            servers,
            state: SchedulerState::Idle,
            lease: None,
            chunk: vec![0; read_chunk],
            rx: Vec::with_capacity(read_chunk * MAX_SERIAL_READS_PER_TICK),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn serial(&self) -> &T {
        &self.serial
    }

    pub fn servers(&self) -> &[StreamServer<A>] {
        &self.servers
    }

    pub fn server(&self, id: &str) -> Option<&StreamServer<A>> {
        self.servers.iter().find(|s| s.id() == id)
    }

    /// Bind every instance with `bind` and enter `Running`.
    ///
    /// If any instance fails to bind, the ones already listening are torn
    /// down again and the scheduler stays out of `Running`.
    pub fn on_start_with(
        &mut self,
        mut bind: impl FnMut(SocketAddr, u32) -> Result<A, ListenerError>,
    ) -> Result<(), BridgeError> {
        if self.state == SchedulerState::Running {
            return Ok(());
        }

        for index in 0..self.servers.len() {
            let server = &mut self.servers[index];
            server.dump_config();
            if let Err(source) = server.start(&mut bind) {
                let server = server.id().to_string();
                self.servers.iter_mut().for_each(StreamServer::stop);
                return Err(BridgeError::Listener { server, source });
            }
        }

        self.state = SchedulerState::Running;
        tracing::info!(servers = self.servers.len(), "Bridge running");
        Ok(())
    }

    /// Run one tick. Does nothing unless `Running`.
    pub fn on_tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.state != SchedulerState::Running {
            return report;
        }

        for server in &mut self.servers {
            report.accepted += server.accept_pending();
        }

        self.fan_out(&mut report);
        self.fan_in(&mut report);

        for server in &mut self.servers {
            report.sent_to_clients += server.clients_mut().flush_all().bytes;
        }
        for server in &mut self.servers {
            report.closed += server.reap();
        }

        if !report.is_idle() {
            tracing::trace!(?report, "Tick");
        }
        report
    }

    /// Close every client and listener. Safe to call more than once.
    pub fn on_stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        for server in &mut self.servers {
            server.stop();
        }
        self.lease = None;
        self.state = SchedulerState::Stopped;
        tracing::info!("Bridge stopped");
    }

    /// Tick every `tick_interval` until `shutdown` fires, then stop.
    pub async fn run(mut self, tick_interval: Duration, mut shutdown: broadcast::Receiver<()>) -> Self {
        let mut ticker = time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Bridge received shutdown signal");
                    break;
                }
            }
        }

        self.on_stop();
        self
    }

    /// Read what the UART has and copy it to every active client.
    fn fan_out(&mut self, report: &mut TickReport) {
        self.rx.clear();
        for _ in 0..MAX_SERIAL_READS_PER_TICK {
            match self.serial.read_available(&mut self.chunk) {
                Ok(0) => break,
                Ok(n) => self.rx.extend_from_slice(&self.chunk[..n]),
                Err(e) => {
                    tracing::warn!(error = %e, "Serial read failed, treating as no data");
                    metrics::record_transport_error("read");
                    break;
                }
            }
        }
        if self.rx.is_empty() {
            return;
        }

        report.serial_read += self.rx.len();
        metrics::record_serial_rx(self.rx.len());
        tracing::trace!(bytes = self.rx.len(), data = %hex_preview(&self.rx), "Serial data received");

        for server in &mut self.servers {
            let lost = server.clients_mut().enqueue_inbound_for_all(&self.rx);
            if lost > 0 {
                metrics::record_dropped(server.id(), lost);
                report.dropped += lost;
            }
        }
    }

    /// Pull client bytes off the sockets and hand them to the UART.
    fn fan_in(&mut self, report: &mut TickReport) {
        for server in &mut self.servers {
            server.clients_mut().receive_all();
        }

        let written_before = report.serial_written;
        self.write_to_serial(report);
        let written = report.serial_written - written_before;
        if written > 0 {
            metrics::record_serial_tx(written);
        }
    }

    fn write_to_serial(&mut self, report: &mut TickReport) {
        if let Some(lease) = self.lease.take() {
            let Some(server) = self.servers.get_mut(lease.server) else {
                return;
            };
            match write_span(&mut self.serial, server.clients_mut(), lease.connection, lease.remaining) {
                Span::Done(n) => report.serial_written += n,
                Span::Gone => {}
                Span::Partial { written, remaining } => {
                    report.serial_written += written;
                    self.lease = Some(SerialLease { remaining, ..lease });
                    return;
                }
                Span::Failed {
                    written,
                    remaining,
                    error,
                } => {
                    report.serial_written += written;
                    serial_write_failed(&error);
                    self.lease = Some(SerialLease { remaining, ..lease });
                    return;
                }
            }
        }

        for (index, server) in self.servers.iter_mut().enumerate() {
            for id in server.clients().ids() {
                match write_span(&mut self.serial, server.clients_mut(), id, usize::MAX) {
                    Span::Done(n) => report.serial_written += n,
                    Span::Gone => {}
                    Span::Partial { written, remaining } => {
                        report.serial_written += written;
                        tracing::trace!(
                            server = %server.id(),
                            connection_id = %id,
                            remaining,
                            "Serial transport saturated"
                        );
                        self.lease = Some(SerialLease {
                            server: index,
                            connection: id,
                            remaining,
                        });
                        return;
                    }
                    Span::Failed {
                        written,
                        remaining,
                        error,
                    } => {
                        report.serial_written += written;
                        serial_write_failed(&error);
                        if written > 0 {
                            self.lease = Some(SerialLease {
                                server: index,
                                connection: id,
                                remaining,
                            });
                        }
                        return;
                    }
                }
            }
        }
    }
}

impl<T: SerialTransport> BridgeScheduler<T, Listener> {
    /// Bind every instance to its configured TCP endpoint and enter `Running`.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn on_start(&mut self) -> Result<(), BridgeError> {
        self.on_start_with(Listener::bind)
    }
}

/// Write up to `max` of a client's queued bytes to the UART.
fn write_span<T: SerialTransport, S: ClientSocket>(
    serial: &mut T,
    clients: &mut ClientRegistry<S>,
    id: ConnectionId,
    max: usize,
) -> Span {
    let Some(conn) = clients.get(id) else {
        return Span::Gone;
    };
    let span = conn.inbound_len().min(max);
    if span == 0 {
        return Span::Done(0);
    }

    match clients.drain_outbound(id, span, |chunk| serial.write(chunk)) {
        None => Span::Gone,
        Some(Ok(drained)) if drained.written >= span => Span::Done(drained.written),
        Some(Ok(drained)) => Span::Partial {
            written: drained.written,
            remaining: span - drained.written,
        },
        Some(Err(DrainError { written, source })) => Span::Failed {
            written,
            remaining: span - written,
            error: source,
        },
    }
}

fn serial_write_failed(err: &TransportError) {
    tracing::warn!(error = %err, "Serial write failed, client bytes kept for next tick");
    metrics::record_transport_error("write");
}
