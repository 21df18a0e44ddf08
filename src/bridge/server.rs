//! One stream server instance: a listener plus its client registry.
//!
//! Several instances can coexist (one per configured port). None of them owns
//! the UART; the scheduler lends it to each in turn.

use std::net::SocketAddr;

use crate::config::{validate_server, ConfigError, ServerConfig};
use crate::net::{Acceptor, ClientRegistry, ListenerError, QueueLimits};
use crate::observability::metrics;

pub struct StreamServer<A: Acceptor> {
    config: ServerConfig,
    listener: Option<A>,
    clients: ClientRegistry<A::Socket>,
}

impl<A: Acceptor> StreamServer<A> {
    /// Validate `config` and build an idle instance.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let errors = validate_server(&config);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        let limits = QueueLimits {
            inbound: config.inbound_buffer_size,
            outbound: config.buffer_size,
        };
        Ok(Self {
            clients: ClientRegistry::new(config.id.clone(), limits),
            config,
            listener: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn clients(&self) -> &ClientRegistry<A::Socket> {
        &self.clients
    }

    pub fn clients_mut(&mut self) -> &mut ClientRegistry<A::Socket> {
        &mut self.clients
    }

    /// Bind the listener with `bind` unless already listening.
    pub fn start(
        &mut self,
        bind: impl FnOnce(SocketAddr, u32) -> Result<A, ListenerError>,
    ) -> Result<(), ListenerError> {
        if self.listener.is_some() {
            return Ok(());
        }
        let addr = self
            .config
            .socket_addr()
            .map_err(|_| ListenerError::InvalidAddress(self.config.bind_address.clone()))?;
        self.listener = Some(bind(addr, self.config.backlog)?);
        self.publish_state();
        Ok(())
    }

    /// Accept every pending connection.
    ///
    /// Accept errors are logged and end the pass for this tick.
    pub fn accept_pending(&mut self) -> usize {
        let Some(listener) = self.listener.as_mut() else {
            return 0;
        };

        let mut accepted = 0;
        loop {
            match listener.poll_new_connection() {
                Ok(Some((socket, peer))) => {
                    self.clients.add(socket, peer);
                    accepted += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(server = %self.config.id, error = %e, "Accept failed");
                    break;
                }
            }
        }

        if accepted > 0 {
            self.publish_state();
        }
        accepted
    }

    /// Finish closing failed clients. Returns how many were removed.
    pub fn reap(&mut self) -> usize {
        let removed = self.clients.reap();
        if removed > 0 {
            self.publish_state();
        }
        removed
    }

    /// Stop accepting and close every client, discarding queued bytes.
    pub fn stop(&mut self) {
        let had_listener = self.listener.take().is_some();
        let closed = self.clients.close_all();
        if had_listener || closed > 0 {
            tracing::info!(server = %self.config.id, closed, "Stream server stopped");
        }
        self.publish_state();
    }

    /// Log the effective configuration.
    pub fn dump_config(&self) {
        tracing::info!(
            server = %self.config.id,
            address = %self.config.bind_address,
            port = self.config.port,
            buffer_size = self.config.buffer_size,
            inbound_buffer_size = self.config.inbound_buffer_size,
            backlog = self.config.backlog,
            "Stream server"
        );
    }

    fn publish_state(&self) {
        metrics::publish_clients(&self.config.id, self.clients.len());
    }
}
