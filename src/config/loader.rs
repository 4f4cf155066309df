//! Configuration loading from disk and command-line overrides.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line or through the environment.
/// Each `Some` replaces the corresponding file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub cloud_origin: Option<String>,
    pub frontend_port: Option<u16>,
    pub backend_port: Option<u16>,
    pub cloud_mode: bool,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(origin) = &self.cloud_origin {
            config.upstreams.cloud_origin = origin.trim_end_matches('/').to_string();
        }
        if let Some(port) = self.frontend_port {
            config.upstreams.frontend_port = port;
        }
        if let Some(port) = self.backend_port {
            config.upstreams.backend_port = port;
        }
        if self.cloud_mode {
            config.routing.local_mode = false;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: file (or defaults), then overrides, then validation.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
