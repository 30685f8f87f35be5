//! Hub facade: the API surface consumed by the host application.
//!
//! # Responsibilities
//! - Wire the listener, registry, event bus, and broadcast coordinator
//! - Expose send/broadcast/close/close_all against connection ids
//! - Accept already-upgraded message connections from the negotiation layer
//! - Drive global shutdown: stop accepting, close every connection, wait
//!   for the registry to drain

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;

use crate::broadcast::{BroadcastCoordinator, BroadcastOutcome};
use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::EventBus;
use crate::lifecycle::Shutdown;
use crate::net::connection::{self, ConnectionId, ConnectionLimits, ConnectionShared};
use crate::net::framing::{self, FramingMode};
use crate::net::listener::Listener;
use crate::registry::ConnectionRegistry;

/// Owns the connection lifecycle engine.
///
/// All state is internally shared, so a `SocketHub` can itself live behind an
/// `Arc` and be used from any task.
pub struct SocketHub {
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    events: Arc<EventBus>,
    shutdown: Arc<Shutdown>,
    broadcaster: BroadcastCoordinator,
}

impl SocketHub {
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let events = Arc::new(EventBus::new());
        let broadcaster = BroadcastCoordinator::new(Arc::clone(&registry), Arc::clone(&events));
        Self {
            config,
            registry,
            events,
            shutdown: Arc::new(Shutdown::new()),
            broadcaster,
        }
    }

    /// Subscription registration for the five event kinds.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The live-connection store (lookup and snapshot are public operations).
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Bind the configured listener and launch the accept loop. Returns the
    /// bound address (useful when the config requested an ephemeral port).
    ///
    /// A bind failure is fatal to the listener and reported here; everything
    /// after that is connection-scoped.
    pub async fn start(&self) -> Result<SocketAddr, HubError> {
        let listener = Listener::bind(&self.config.listener)?;
        let local_addr = listener.local_addr().map_err(|source| HubError::Bind {
            addr: self.config.listener.bind_address.clone(),
            source,
        })?;

        tokio::spawn(listener.run(
            self.shared(),
            self.config.connection.recv_buffer_bytes,
            Arc::clone(&self.shutdown),
        ));

        Ok(local_addr)
    }

    /// Enqueue a payload on one connection's bounded send queue.
    pub fn send(&self, id: ConnectionId, payload: impl Into<Vec<u8>>) -> Result<(), HubError> {
        let conn = self
            .registry
            .lookup(id)
            .ok_or(HubError::UnknownConnection(id))?;
        conn.send(payload.into())
    }

    /// Fan a payload out to a registry snapshot. One outcome per connection;
    /// individual failures never abort the rest.
    pub fn broadcast(&self, payload: &[u8]) -> Vec<BroadcastOutcome> {
        self.broadcaster.broadcast(payload)
    }

    /// Close one connection and wait until it reaches Closed.
    ///
    /// Idempotent: closing a connection that is already Closing, Closed, or
    /// gone from the registry is a no-op. Once this returns, the connection
    /// emits no further events.
    pub async fn close(&self, id: ConnectionId) {
        let Some(conn) = self.registry.lookup(id) else {
            return;
        };
        conn.request_close();
        conn.wait_closed().await;
    }

    /// Close every currently registered connection and wait for each.
    pub async fn close_all(&self) {
        let snapshot = self.registry.snapshot();
        tracing::debug!(connections = snapshot.len(), "Closing all connections");
        for conn in &snapshot {
            conn.request_close();
        }
        for conn in &snapshot {
            conn.wait_closed().await;
        }
    }

    /// Stop accepting, close every connection, and wait for the registry to
    /// drain. No connection task survives this call.
    pub async fn stop(&self) {
        tracing::info!("Hub stopping");
        self.shutdown.trigger();
        self.close_all().await;
        self.registry.wait_empty().await;
        tracing::info!("Hub stopped");
    }

    /// Adopt an already-negotiated full-duplex message connection.
    ///
    /// The upgrade handshake happens in an external negotiation layer; the
    /// hub takes the resulting stream and runs it through the same registry,
    /// events, and lifecycle as an accepted raw connection.
    pub fn attach_message(
        &self,
        stream: WebSocketStream<TcpStream>,
        peer_addr: SocketAddr,
    ) -> ConnectionId {
        let (reader, writer) = framing::split_message(stream);
        let conn = connection::spawn(
            reader,
            writer,
            peer_addr,
            FramingMode::Message,
            self.shared(),
            &self.shutdown,
            None,
        );
        tracing::debug!(
            connection_id = %conn.id(),
            peer_addr = %peer_addr,
            "Message connection attached"
        );
        conn.id()
    }

    fn shared(&self) -> ConnectionShared {
        ConnectionShared {
            registry: Arc::clone(&self.registry),
            events: Arc::clone(&self.events),
            limits: ConnectionLimits::from_config(&self.config),
        }
    }
}
