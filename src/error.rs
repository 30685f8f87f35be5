//! Error taxonomy for the hub.
//!
//! # Design Decisions
//! - Unknown-client and wrong-state conditions are returned as typed values,
//!   not raised; only a bind failure aborts startup.
//! - Connection-scoped failures stay local to their connection and flow
//!   through the error event alongside the operation's return value.

use thiserror::Error;

use crate::net::connection::{ConnectionId, ConnectionState};
use crate::net::framing::TransportError;

/// Errors surfaced by hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The listener could not bind to the configured address. Fatal to start.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An id-addressed send named a connection the registry does not hold.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The operation requires an Open connection.
    #[error("connection {id} is {state:?}, expected Open")]
    InvalidState {
        id: ConnectionId,
        state: ConnectionState,
    },

    /// The bounded send queue rejected the payload.
    #[error("send queue full for connection {0}")]
    QueueFull(ConnectionId),

    /// I/O, framing, or timeout failure on the transport. Drives the affected
    /// connection to Closing.
    #[error("transport failure on connection {id}: {source}")]
    Transport {
        id: ConnectionId,
        #[source]
        source: TransportError,
    },
}
