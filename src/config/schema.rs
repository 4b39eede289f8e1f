//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend API location and forwarding policy.
    pub backend: BackendConfig,

    /// Mount points for the proxy handlers.
    pub mounts: MountConfig,

    /// Auth relay settings.
    pub auth: AuthConfig,

    /// Page access gate settings.
    pub gate: GateConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry settings used by the API client.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API, including the version segment.
    pub base_url: String,

    /// Follow 3xx responses on API forwarding instead of rejecting them.
    pub follow_redirects: bool,

    /// Root under which the backend serves media files.
    pub media_root: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            follow_redirects: false,
            media_root: "/media/".to_string(),
        }
    }
}

/// Mount points served by the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    /// Prefix of the generic API proxy.
    pub proxy_prefix: String,

    /// Prefix of the media proxy.
    pub media_prefix: String,

    /// Prefix of the auth relay handlers.
    pub auth_prefix: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            proxy_prefix: "/api/proxy".to_string(),
            media_prefix: "/api/media".to_string(),
            auth_prefix: "/api/auth".to_string(),
        }
    }
}

/// Auth relay configuration.
///
/// Backend paths are relative to [`BackendConfig::base_url`] and keep their
/// trailing slash.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub login_path: String,
    pub me_path: String,
    pub logout_path: String,
    pub refresh_path: String,

    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,

    /// Lifetime of the `access` cookie in seconds.
    pub access_max_age_secs: i64,

    /// Lifetime of the `refresh` cookie in seconds.
    pub refresh_max_age_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login/".to_string(),
            me_path: "/auth/me/".to_string(),
            logout_path: "/auth/logout/".to_string(),
            refresh_path: "/auth/refresh/".to_string(),
            secure_cookies: false,
            access_max_age_secs: 60 * 60,
            refresh_max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Page access gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Login page path.
    pub login_path: String,

    /// Landing page for authenticated users.
    pub home_path: String,

    /// Path prefix that requires an `access` cookie.
    pub protected_prefix: String,

    /// Headers whose presence marks a speculative prefetch.
    pub prefetch_headers: Vec<String>,

    /// Directory the page fallback serves from.
    pub pages_root: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
            protected_prefix: "/dashboard".to_string(),
            prefetch_headers: vec![
                "next-router-prefetch".to_string(),
                "x-middleware-prefetch".to_string(),
            ],
            pages_root: "public".to_string(),
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Whole-request timeout for inbound requests in seconds. Must exceed
    /// `request_secs` so upstream timeouts surface as gateway errors.
    pub server_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            server_secs: 35,
        }
    }
}

/// Retry configuration for the API client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds; the base delay when
    /// `backoff` is exponential.
    pub retry_delay_ms: u64,

    /// Delay schedule between attempts.
    pub backoff: BackoffKind,

    /// Upper bound for exponential delays in milliseconds.
    pub max_retry_delay_ms: u64,

    /// Statuses treated as a backend cold start.
    pub retry_statuses: Vec<u16>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1500,
            backoff: BackoffKind::Fixed,
            max_retry_delay_ms: 10_000,
            retry_statuses: vec![501, 502, 503, 504],
        }
    }
}

/// Retry delay schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes (uploads included).
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Role based module visibility.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Role name -> modules it may open. `"*"` grants every module.
    pub roles: HashMap<String, Vec<String>>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        let mut roles = HashMap::new();
        roles.insert("admin".to_string(), vec!["*".to_string()]);
        roles.insert(
            "gerente".to_string(),
            [
                "clientes",
                "equipamentos",
                "manutencoes",
                "estoque",
                "compras",
                "financeiro",
                "nr12",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        );
        roles.insert(
            "tecnico".to_string(),
            ["equipamentos", "manutencoes", "nr12"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        );
        Self { roles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://erp.example.com/api/v2/"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "https://erp.example.com/api/v2/");
        assert!(!config.backend.follow_redirects);
        assert_eq!(config.mounts.proxy_prefix, "/api/proxy");
        assert_eq!(config.client.max_attempts, 3);
        assert_eq!(config.client.retry_statuses, vec![501, 502, 503, 504]);
        assert_eq!(config.client.backoff, BackoffKind::Fixed);
    }

    #[test]
    fn test_exponential_backoff_option() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [client]
            backoff = "exponential"
            retry_delay_ms = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.client.backoff, BackoffKind::Exponential);
        assert_eq!(config.client.max_retry_delay_ms, 10_000);
    }

    #[test]
    fn test_permissions_table() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [permissions.roles]
            almoxarife = ["estoque", "compras"]
            "#,
        )
        .unwrap();

        assert_eq!(config.permissions.roles.len(), 1);
        assert_eq!(config.permissions.roles["almoxarife"], vec!["estoque", "compras"]);
    }
}
