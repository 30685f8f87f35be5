//! Concurrency-safe connection registry.
//!
//! # Design Decisions
//! - Sharded map (DashMap) so lookups and snapshots never block behind a
//!   writer, and callers need no coordination of their own
//! - Entries are created only on successful accept/attach and removed only
//!   after a connection reaches Closed, so anything reachable via lookup is
//!   still live

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::net::connection::{Connection, ConnectionId};

/// Id → connection store shared by the listener, the hub API, and every
/// connection task.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Insert a newly accepted connection. Ids are allocated fresh at accept
    /// time, so a collision would mean an id was reused.
    pub(crate) fn register(&self, conn: Arc<Connection>) {
        let id = conn.id();
        if self.connections.insert(id, conn).is_some() {
            tracing::warn!(connection_id = %id, "Replaced a registered connection id");
        }
    }

    /// Remove a connection that has reached Closed.
    pub(crate) fn unregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    /// Find a live connection by id.
    pub fn lookup(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Point-in-time copy of the current connections, safe to iterate while
    /// registrations and removals continue.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Wait until every connection has closed and unregistered.
    pub(crate) async fn wait_empty(&self) {
        while !self.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
