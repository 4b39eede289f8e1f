//! Top-level startup errors.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build upstream HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },
}
