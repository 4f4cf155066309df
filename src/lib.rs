//! Local development reverse proxy library

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
