//! Broadcast fan-out over the connection registry.
//!
//! # Design Decisions
//! - Delivery set is a point-in-time registry snapshot; connections closed
//!   mid-broadcast fail individually without aborting the fan-out
//! - Completion means "send attempted on every snapshotted connection",
//!   not delivered-and-acknowledged
//! - No ordering guarantee among deliveries to different connections

use std::sync::Arc;

use crate::error::HubError;
use crate::events::EventBus;
use crate::net::connection::ConnectionId;
use crate::registry::ConnectionRegistry;

/// Result of one delivery attempt within a broadcast.
#[derive(Debug)]
pub struct BroadcastOutcome {
    pub id: ConnectionId,
    pub result: Result<(), HubError>,
}

/// Fans a payload out to every connection in a registry snapshot.
pub struct BroadcastCoordinator {
    registry: Arc<ConnectionRegistry>,
    events: Arc<EventBus>,
}

impl BroadcastCoordinator {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>, events: Arc<EventBus>) -> Self {
        Self { registry, events }
    }

    /// Attempt a send on every snapshotted connection, collecting one outcome
    /// per entry. Failures are also surfaced through the error event.
    pub fn broadcast(&self, payload: &[u8]) -> Vec<BroadcastOutcome> {
        let snapshot = self.registry.snapshot();
        tracing::debug!(
            connections = snapshot.len(),
            bytes = payload.len(),
            "Broadcasting"
        );

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for conn in snapshot {
            let result = conn.send(payload.to_vec());
            if let Err(err) = &result {
                tracing::debug!(
                    connection_id = %conn.id(),
                    error = %err,
                    "Broadcast delivery failed"
                );
                self.events.emit_error(&conn.info(), err);
            }
            outcomes.push(BroadcastOutcome {
                id: conn.id(),
                result,
            });
        }
        outcomes
    }
}
