//! Top-level errors surfaced by server construction and startup.

use std::io;

use crate::config::ConfigError;
use crate::http::dispatch::OriginError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to build lookup client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

impl ProxyError {
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

