//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffers and queues non-zero, timeouts non-zero)
//! - Check the bind address parses as host:port
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: HubConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::HubConfig;

/// A single semantic problem found in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a host:port pair")]
    InvalidBindAddress(String),

    #[error("listener.backlog must be greater than zero")]
    ZeroBacklog,

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("connection.recv_buffer_bytes must be greater than zero")]
    ZeroRecvBuffer,

    #[error("connection.send_queue_capacity must be greater than zero")]
    ZeroSendQueue,

    #[error("timeouts.read_secs must be greater than zero")]
    ZeroReadTimeout,

    #[error("timeouts.write_secs must be greater than zero")]
    ZeroWriteTimeout,
}

/// Validate a parsed config, collecting every problem found.
pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.connection.recv_buffer_bytes == 0 {
        errors.push(ValidationError::ZeroRecvBuffer);
    }
    if config.connection.send_queue_capacity == 0 {
        errors.push(ValidationError::ZeroSendQueue);
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::ZeroReadTimeout);
    }
    if config.timeouts.write_secs == 0 {
        errors.push(ValidationError::ZeroWriteTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&HubConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = HubConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.listener.backlog = 0;
        config.connection.send_queue_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroBacklog));
        assert!(errors.contains(&ValidationError::ZeroSendQueue));
    }

    #[test]
    fn hostname_addresses_are_rejected() {
        let mut config = HubConfig::default();
        config.listener.bind_address = "localhost:10085".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidBindAddress(
                "localhost:10085".into()
            )]
        );
    }
}
