//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     stop() → trigger broadcast → accept loop exits,
//!     connection tasks drive their connections to Closed
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, request close on every connection,
//!   wait for the registry to drain
//! - No connection task outlives the shutdown signal

pub mod shutdown;

pub use shutdown::Shutdown;
