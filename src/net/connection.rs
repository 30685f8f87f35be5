//! Connection state machine and per-connection actor.
//!
//! # Responsibilities
//! - Track connection state (Connecting → Open → Closing → Closed)
//! - Own the transport exclusively inside one task, serializing the read
//!   path, queued writes, and close against each other
//! - Enforce send-queue backpressure and per-I/O timeouts
//! - Emit Receive/Send/Error/Close notifications at the right transitions
//!
//! # Design Decisions
//! - External callers never touch the transport: `send` enqueues onto a
//!   bounded queue, `request_close` flips state and signals the task, so no
//!   write can race with handle release
//! - Close is idempotent: the state transition is a compare-and-swap and the
//!   task emits Close exactly once
//! - The task exits permanently on Closed; there is no restart

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, OwnedSemaphorePermit};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::EventBus;
use crate::lifecycle::Shutdown;
use crate::net::framing::{FrameReader, FrameWriter, FramingMode, TransportError};
use crate::registry::ConnectionRegistry;

/// Unique identifier for a connection, assigned at acceptance and immutable
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection lifecycle state. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport accepted, not yet registered as ready.
    Connecting = 0,
    /// Live; sends are accepted.
    Open = 1,
    /// Close requested or transport failed; draining queued sends.
    Closing = 2,
    /// Transport released, entry removed. Terminal.
    Closed = 3,
}

fn state_from(raw: u8) -> ConnectionState {
    match raw {
        0 => ConnectionState::Connecting,
        1 => ConnectionState::Open,
        2 => ConnectionState::Closing,
        _ => ConnectionState::Closed,
    }
}

/// Immutable descriptor handed to event subscribers.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub framing: FramingMode,
}

/// Per-connection sizing and timeout limits, fixed at accept time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub send_queue: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl ConnectionLimits {
    pub(crate) fn from_config(config: &HubConfig) -> Self {
        Self {
            send_queue: config.connection.send_queue_capacity,
            read_timeout: Duration::from_secs(config.timeouts.read_secs),
            write_timeout: Duration::from_secs(config.timeouts.write_secs),
        }
    }
}

/// Everything a connection task shares with the rest of the hub.
#[derive(Clone)]
pub(crate) struct ConnectionShared {
    pub registry: Arc<ConnectionRegistry>,
    pub events: Arc<EventBus>,
    pub limits: ConnectionLimits,
}

/// One live bidirectional channel to a single peer.
///
/// The struct is the shared handle; the transport itself lives in the
/// connection's task and is released exactly once on the way to Closed.
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    framing: FramingMode,
    state: AtomicU8,
    outbound: mpsc::Sender<Vec<u8>>,
    close_request: watch::Sender<bool>,
    closed: watch::Receiver<bool>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn framing(&self) -> FramingMode {
        self.framing
    }

    pub fn state(&self) -> ConnectionState {
        state_from(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub(crate) fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            peer_addr: self.peer_addr,
            framing: self.framing,
        }
    }

    /// Enqueue a payload for asynchronous write.
    ///
    /// Requires state Open; no I/O happens on failure. A full queue is
    /// reported promptly rather than buffered without bound.
    pub fn send(&self, payload: Vec<u8>) -> Result<(), HubError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(HubError::InvalidState { id: self.id, state });
        }
        match self.outbound.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(HubError::QueueFull(self.id)),
            // The task closed the queue between our state check and the send.
            Err(mpsc::error::TrySendError::Closed(_)) => Err(HubError::InvalidState {
                id: self.id,
                state: self.state(),
            }),
        }
    }

    /// Request the Open → Closing transition. Returns true only for the call
    /// that performed it; later (or concurrent) calls are no-ops.
    pub(crate) fn request_close(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= ConnectionState::Closing as u8 {
                return false;
            }
            match self.state.compare_exchange(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _ = self.close_request.send(true);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Resolve once the connection has reached Closed and unregistered.
    pub(crate) async fn wait_closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|done| *done).await;
    }

    fn mark_open(&self) {
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting as u8,
            ConnectionState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn finalize(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn stub() -> (Arc<Self>, mpsc::Receiver<Vec<u8>>) {
        let (outbound, outbound_rx) = mpsc::channel(1);
        let (close_request, _close_rx) = watch::channel(false);
        let (_done_tx, closed) = watch::channel(false);
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            peer_addr: "127.0.0.1:0".parse().expect("loopback addr"),
            framing: FramingMode::Stream,
            state: AtomicU8::new(ConnectionState::Open as u8),
            outbound,
            close_request,
            closed,
        });
        (conn, outbound_rx)
    }
}

/// Construct, register, and launch a connection.
///
/// Sequence: allocate id → state Connecting → register → Open → Connect
/// event → spawn the task. The permit (if any) rides with the task so the
/// accept limit is released when the connection closes.
pub(crate) fn spawn(
    reader: FrameReader,
    writer: FrameWriter,
    peer_addr: SocketAddr,
    framing: FramingMode,
    shared: ConnectionShared,
    shutdown: &Shutdown,
    permit: Option<OwnedSemaphorePermit>,
) -> Arc<Connection> {
    let (outbound_tx, outbound_rx) = mpsc::channel(shared.limits.send_queue);
    let (close_tx, close_rx) = watch::channel(false);
    let (done_tx, done_rx) = watch::channel(false);

    let conn = Arc::new(Connection {
        id: ConnectionId::new(),
        peer_addr,
        framing,
        state: AtomicU8::new(ConnectionState::Connecting as u8),
        outbound: outbound_tx,
        close_request: close_tx,
        closed: done_rx,
    });

    shared.registry.register(Arc::clone(&conn));
    conn.mark_open();
    shared.events.emit_connect(&conn.info());

    let shutdown_rx = shutdown.subscribe();
    if shutdown.is_triggered() {
        // The broadcast fired before we subscribed; close immediately.
        conn.request_close();
    }

    tokio::spawn(run(
        Arc::clone(&conn),
        reader,
        writer,
        outbound_rx,
        close_rx,
        done_tx,
        shared,
        shutdown_rx,
        permit,
    ));

    conn
}

/// The connection actor: sole owner of the transport halves.
///
/// Runs while state ∈ {Open, Closing}; exits permanently on Closed.
#[allow(clippy::too_many_arguments)]
async fn run(
    conn: Arc<Connection>,
    mut reader: FrameReader,
    mut writer: FrameWriter,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    mut close_request: watch::Receiver<bool>,
    done: watch::Sender<bool>,
    shared: ConnectionShared,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
    permit: Option<OwnedSemaphorePermit>,
) {
    let info = conn.info();
    let limits = shared.limits;
    let mut failure: Option<TransportError> = None;

    loop {
        tokio::select! {
            read = timeout(limits.read_timeout, reader.next_frame()) => match read {
                Ok(Ok(Some(payload))) => {
                    tracing::trace!(
                        connection_id = %info.id,
                        bytes = payload.len(),
                        "Frame received"
                    );
                    shared.events.emit_receive(&info, &payload);
                }
                Ok(Ok(None)) => {
                    tracing::debug!(connection_id = %info.id, "Peer closed");
                    break;
                }
                Ok(Err(err)) => {
                    failure = Some(err);
                    break;
                }
                Err(_) => {
                    failure = Some(TransportError::Timeout(limits.read_timeout));
                    break;
                }
            },
            queued = outbound.recv() => match queued {
                Some(payload) => {
                    match timeout(limits.write_timeout, writer.write_frame(&payload)).await {
                        Ok(Ok(())) => shared.events.emit_send(&info, &payload),
                        Ok(Err(err)) => {
                            failure = Some(err);
                            break;
                        }
                        Err(_) => {
                            failure = Some(TransportError::Timeout(limits.write_timeout));
                            break;
                        }
                    }
                }
                None => break,
            },
            _ = close_request.changed() => break,
            _ = shutdown.recv() => break,
        }
    }

    // Whichever path ended the loop, the state is Closing from here on and
    // no new sends are accepted.
    conn.request_close();
    outbound.close();

    if let Some(source) = failure {
        let err = HubError::Transport {
            id: info.id,
            source,
        };
        tracing::debug!(connection_id = %info.id, error = %err, "Connection failed");
        shared.events.emit_error(&info, &err);
    } else {
        drain(&mut writer, &mut outbound, &info, &shared, limits.write_timeout).await;
    }

    if let Err(err) = writer.finish().await {
        tracing::trace!(connection_id = %info.id, error = %err, "Transport teardown");
    }

    conn.finalize();
    shared.registry.unregister(info.id);
    shared.events.emit_close(&info);
    let _ = done.send(true);
    drop(permit);

    tracing::debug!(connection_id = %info.id, "Connection closed");
}

/// Write out sends that were queued before the close request. Abandons the
/// rest on the first failure or timeout.
async fn drain(
    writer: &mut FrameWriter,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
    info: &ConnectionInfo,
    shared: &ConnectionShared,
    write_timeout: Duration,
) {
    while let Some(payload) = outbound.recv().await {
        match timeout(write_timeout, writer.write_frame(&payload)).await {
            Ok(Ok(())) => shared.events.emit_send(info, &payload),
            Ok(Err(_)) | Err(_) => {
                tracing::debug!(connection_id = %info.id, "Abandoning queued sends");
                break;
            }
        }
    }
}
