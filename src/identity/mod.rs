//! Firm identity resolution.
//!
//! # Data Flow
//! ```text
//! firm (from request path)
//!     → resolver.rs (cache hit / join in-flight / start lookup)
//!     → source.rs (GET {origin}/{firm}/firmLoginToFirmGuid, expect 302)
//!     → FirmGuid (lowercase) or ResolveError
//! ```
//!
//! # Design Decisions
//! - One lookup in flight per firm; every waiter gets the same outcome
//! - Failures evict the entry so the next request retries
//! - Resolution failures never fail the proxied request

pub mod resolver;
pub mod source;

pub use resolver::FirmGuidResolver;
pub use source::{FirmGuid, GuidSource, HttpGuidSource, ResolveError};
