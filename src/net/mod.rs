//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id allocation, registration, state machine, task)
//!     → framing.rs (raw chunks or decoded message frames)
//!     → events fan out to subscribers
//!
//! Upgraded connections skip the listener: the negotiation layer hands the
//! hub an already-negotiated WebSocket stream, which joins the same
//! registry and lifecycle.
//!
//! Connection states:
//!     Connecting → Open → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - One task per connection owns the transport; callers interact only
//!   through the send queue and the close signal
//! - Bounded accept permits prevent resource exhaustion
//! - Read/write timeouts keep a stalled peer from pinning a task forever

pub mod connection;
pub mod framing;
pub mod listener;
