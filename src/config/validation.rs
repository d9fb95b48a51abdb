//! Configuration validation.
//!
//! # Responsibilities
//! - Check the bind address parses
//! - Validate value ranges (connection limit > 0)
//! - Keep the listener out of the feature port range
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before anything is bound

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::PORT_RANGE;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    NoConnections,

    #[error("listener port {0} is inside the feature port range 3001..=3997")]
    PortInFeatureRange(u16),
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.listener.bind_address.parse::<SocketAddr>() {
        Ok(addr) if PORT_RANGE.contains(&addr.port()) => {
            errors.push(ValidationError::PortInFeatureRange(addr.port()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        )),
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
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
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn ephemeral_port_is_valid() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "localhost".into();
        config.listener.max_connections = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("localhost".into()),
                ValidationError::NoConnections,
            ]
        );
    }

    #[test]
    fn listener_must_not_shadow_a_feature_port() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "0.0.0.0:3132".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::PortInFeatureRange(3132)])
        );
    }
}
