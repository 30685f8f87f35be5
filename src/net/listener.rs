//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address with the configured backlog
//! - Accept incoming TCP connections, enforcing max_connections via semaphore
//! - Register each accepted connection and launch its task
//! - Keep accepting past individual accept failures; stop on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::error::HubError;
use crate::lifecycle::Shutdown;
use crate::net::connection::{self, ConnectionShared};
use crate::net::framing::{self, FramingMode};

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, further accepts wait until a connection closes
/// and releases its permit.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to the configured address. Fails with `HubError::Bind` when the
    /// address is malformed or unavailable.
    pub fn bind(config: &ListenerConfig) -> Result<Self, HubError> {
        let bind_err = |source: std::io::Error| HubError::Bind {
            addr: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config.bind_address.parse().map_err(|err| {
            bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
        })?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let inner = socket.listen(config.backlog).map_err(bind_err)?;

        let local_addr = inner.local_addr().map_err(bind_err)?;
        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Accept one connection, respecting the connection limit. The permit
    /// must be held for the connection's lifetime.
    async fn accept(
        &self,
    ) -> Result<(TcpStream, SocketAddr, OwnedSemaphorePermit), std::io::Error> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .expect("connection semaphore closed unexpectedly");

        let (stream, addr) = self.inner.accept().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    /// Run the accept loop until shutdown. Each accepted endpoint becomes a
    /// registered raw-stream connection with its own task; a single failed
    /// accept is logged and does not stop the loop.
    pub(crate) async fn run(
        self,
        shared: ConnectionShared,
        recv_buffer: usize,
        shutdown: Arc<Shutdown>,
    ) {
        let mut shutdown_rx = shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Accept loop stopping");
                    break;
                }
                accepted = self.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let (reader, writer) = framing::split_stream(stream, recv_buffer);
                        let conn = connection::spawn(
                            reader,
                            writer,
                            peer_addr,
                            FramingMode::Stream,
                            shared.clone(),
                            &shutdown,
                            Some(permit),
                        );
                        tracing::debug!(
                            connection_id = %conn.id(),
                            peer_addr = %peer_addr,
                            "Connection registered"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                    }
                }
            }
        }
    }
}
