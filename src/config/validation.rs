//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that would only fail once
//! traffic arrives. All errors are collected, not just the first.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.backend.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "backend.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "backend.base_url",
            format!("'{}' is not a URL: {}", config.backend.base_url, e),
        )),
    }

    if !config.backend.media_root.starts_with('/') {
        errors.push(ValidationError::new("backend.media_root", "must start with '/'"));
    }

    for (field, prefix) in [
        ("mounts.proxy_prefix", &config.mounts.proxy_prefix),
        ("mounts.media_prefix", &config.mounts.media_prefix),
        ("mounts.auth_prefix", &config.mounts.auth_prefix),
    ] {
        if !prefix.starts_with('/') || prefix.len() < 2 {
            errors.push(ValidationError::new(field, "must start with '/' and name a segment"));
        } else if prefix.ends_with('/') {
            errors.push(ValidationError::new(field, "must not end with '/'"));
        }
    }

    for (field, path) in [
        ("auth.login_path", &config.auth.login_path),
        ("auth.me_path", &config.auth.me_path),
        ("auth.logout_path", &config.auth.logout_path),
        ("auth.refresh_path", &config.auth.refresh_path),
        ("gate.login_path", &config.gate.login_path),
        ("gate.home_path", &config.gate.home_path),
        ("gate.protected_prefix", &config.gate.protected_prefix),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.server_secs <= config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.server_secs",
            format!(
                "must be greater than timeouts.request_secs ({})",
                config.timeouts.request_secs
            ),
        ));
    }

    if config.client.max_attempts == 0 {
        errors.push(ValidationError::new("client.max_attempts", "must be at least 1"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
