//! sockhub: a hub for many concurrent, long-lived, bidirectional
//! connections. Raw TCP streams and upgraded full-duplex message
//! connections share one registry, lifecycle, and event model, with
//! point-to-point send and fan-out broadcast.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;

pub use broadcast::BroadcastOutcome;
pub use config::HubConfig;
pub use error::HubError;
pub use events::{EventBus, EventKind, SubscriberId};
pub use hub::SocketHub;
pub use net::connection::{Connection, ConnectionId, ConnectionInfo, ConnectionState};
pub use net::framing::FramingMode;
