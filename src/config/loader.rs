//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Backend base URL override.
pub const ENV_BACKEND_URL: &str = "BACKEND_API_URL";
/// Listener bind address override.
pub const ENV_BIND_ADDRESS: &str = "GATEWAY_BIND_ADDRESS";
/// Log level override.
pub const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finish(config, |key| std::env::var(key).ok())
}

/// Defaults plus environment overrides, for running without a file.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default(), |key| std::env::var(key).ok())
}

fn finish(
    mut config: GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides; empty values are ignored.
pub fn apply_env_overrides(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_BACKEND_URL) {
        tracing::debug!(backend = %url, "Backend URL taken from environment");
        config.backend.base_url = url;
    }
    if let Some(bind) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = bind;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
}
