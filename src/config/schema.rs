//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the development proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Upstream targets: local front-end, local backend, cloud origin.
    pub upstreams: UpstreamConfig,

    /// Path classification rules.
    pub routing: RoutingConfig,

    /// Firm GUID lookup settings.
    pub identity: IdentityConfig,

    /// Conversational engagement tracking.
    pub session: SessionConfig,

    /// Outbound timeouts.
    pub timeouts: TimeoutConfig,

    /// CORS handling.
    pub cors: CorsConfig,

    /// Set-Cookie path rewriting.
    pub cookies: CookieConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "127.0.0.1").
    pub host: String,

    /// TCP port the proxy binds to.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3300,
        }
    }
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Host used for both local targets.
    pub local_host: String,

    /// Local front-end dev server port (static assets, agent URLs).
    pub frontend_port: u16,

    /// Local backend port (service-API requests in local mode).
    pub backend_port: u16,

    /// Remote cloud origin (scheme + host[:port]).
    /// Also the base host for firm GUID lookups.
    pub cloud_origin: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            local_host: "localhost".to_string(),
            frontend_port: 3000,
            backend_port: 3388,
            cloud_origin: "https://us.cwcloudtest.com".to_string(),
        }
    }
}

/// Path classification rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Segment matched in `/{firm}/ms/{service_name}`.
    pub service_name: String,

    /// Final segment of `/{firm}/e/eng/{engagement}/s/{agent_slug}`.
    pub agent_slug: String,

    /// Prefixes served by the local front-end unchanged.
    pub static_prefixes: Vec<String>,

    /// Send service-API requests to the local backend instead of the cloud.
    pub local_mode: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            service_name: "ai-assistant".to_string(),
            agent_slug: "aida-agent".to_string(),
            static_prefixes: vec![
                "/_next/".to_string(),
                "/__nextjs".to_string(),
                "/favicon".to_string(),
                "/.well-known/".to_string(),
            ],
            local_mode: true,
        }
    }
}

/// Firm GUID lookup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Timeout for a single lookup in seconds (0 = none).
    pub lookup_timeout_secs: u64,

    /// Lifetime of a resolved GUID in seconds.
    /// Absent means resolved GUIDs live for the whole process.
    pub guid_ttl_secs: Option<u64>,
}

impl IdentityConfig {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.lookup_timeout_secs)
    }

    pub fn guid_ttl(&self) -> Option<Duration> {
        self.guid_ttl_secs.map(Duration::from_secs)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: 10,
            guid_ttl_secs: None,
        }
    }
}

/// How the conversational engagement identifier is shared between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementScope {
    /// One value for the whole process, last write wins.
    #[default]
    Process,
    /// One value per firm, last write wins within a firm.
    Firm,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scope: EngagementScope,
}

/// Timeout configuration for outbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds (0 = none).
    pub connect_secs: u64,

    /// Time allowed until upstream response headers arrive, in seconds (0 = none).
    /// Body streaming is not bounded.
    pub response_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        non_zero_secs(self.connect_secs)
    }

    pub fn response(&self) -> Option<Duration> {
        non_zero_secs(self.response_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            response_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Answer preflights locally and mirror the request origin.
    pub enabled: bool,
}

/// Set-Cookie path widening for relayed responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookies whose `Path` starts with this prefix are rewritten.
    /// Absent disables rewriting entirely.
    pub widen_prefix: Option<String>,

    /// Replacement `Path` value.
    pub new_path: String,

    /// Append `Path` to cookies that have none.
    pub add_path_if_missing: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            widen_prefix: None,
            new_path: "/".to_string(),
            add_path_if_missing: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
