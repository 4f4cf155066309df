//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI / environment overrides
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigOverrides};
pub use schema::{
    CookieConfig, CorsConfig, EngagementScope, IdentityConfig, ListenerConfig,
    ObservabilityConfig, ProxyConfig, RoutingConfig, SessionConfig, TimeoutConfig,
    UpstreamConfig,
};
