//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; every connection-scoped line carries
//!   the connection id
//! - Log level configurable through the environment

pub mod logging;
