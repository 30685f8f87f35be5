//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field carries a default so a minimal (or empty) config is runnable.

use serde::{Deserialize, Serialize};

/// Root configuration for the hub.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HubConfig {
    /// Listener configuration (bind address, backlog, limits).
    pub listener: ListenerConfig,

    /// Per-connection buffer and queue sizing.
    pub connection: ConnectionConfig,

    /// Per-connection I/O timeouts.
    pub timeouts: TimeoutConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:10085").
    pub bind_address: String,

    /// Accept backlog passed to the OS listen queue.
    pub backlog: u32,

    /// Maximum concurrent connections (backpressure on accept).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:10085".to_string(),
            backlog: 100,
            max_connections: 10_000,
        }
    }
}

/// Per-connection buffer and queue sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Receive buffer size in bytes for raw stream reads.
    pub recv_buffer_bytes: usize,

    /// Capacity of the bounded outbound send queue. Sends beyond this fail
    /// promptly instead of buffering without limit.
    pub send_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            recv_buffer_bytes: 4096,
            send_queue_capacity: 64,
        }
    }
}

/// Per-connection I/O timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on a single read attempt. A peer that stalls past this is
    /// closed with a transport error. Any traffic rearms the bound.
    pub read_secs: u64,

    /// Upper bound on a single write, including the close-time queue drain.
    pub write_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 300,
            write_secs: 30,
        }
    }
}
