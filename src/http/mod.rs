//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS)
//!     → dispatch.rs (classify path, resolve firm GUID, build target)
//!     → upstream.rs (strip hop-by-hop, inject identity, stream body out)
//!     → response.rs (copy status/headers, rewrite cookies, stream body back)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use dispatch::{Dispatcher, OriginError, TargetError, UpstreamPlan};
pub use request::X_REQUEST_ID;
pub use server::ProxyServer;
pub use upstream::{UpstreamClient, UpstreamError};
