//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (dotenvy) + config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so an empty file is a valid development setup
//! - `BACKEND_API_URL` overrides the backend base from the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AuthConfig, BackendConfig, BackoffKind, ClientConfig, GateConfig, GatewayConfig, ListenerConfig,
    MountConfig, ObservabilityConfig, PermissionsConfig, SecurityConfig, TimeoutConfig,
};
