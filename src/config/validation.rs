//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports non-zero, origins parse)
//! - Validate path fragments used by the classifier
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
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

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.upstreams.frontend_port == 0 {
        errors.push(ValidationError::new("upstreams.frontend_port", "must be non-zero"));
    }
    if config.upstreams.backend_port == 0 {
        errors.push(ValidationError::new("upstreams.backend_port", "must be non-zero"));
    }
    if config.upstreams.local_host.is_empty() {
        errors.push(ValidationError::new("upstreams.local_host", "must not be empty"));
    }

    match Url::parse(&config.upstreams.cloud_origin) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::new(
                    "upstreams.cloud_origin",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("upstreams.cloud_origin", "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new(
            "upstreams.cloud_origin",
            format!("invalid URL: {}", e),
        )),
    }

    check_segment(&mut errors, "routing.service_name", &config.routing.service_name);
    check_segment(&mut errors, "routing.agent_slug", &config.routing.agent_slug);

    for prefix in &config.routing.static_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "routing.static_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }

    if !config.cookies.new_path.starts_with('/') {
        errors.push(ValidationError::new("cookies.new_path", "must start with '/'"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_segment(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if value.contains('/') {
        errors.push(ValidationError::new(field, "must be a single path segment"));
    }
}
