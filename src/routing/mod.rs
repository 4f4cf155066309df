//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → classifier.rs (priority-ordered classification)
//!     → matcher.rs (segment / prefix checks, captures)
//!     → Return: RouteClass (always exactly one)
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same path always yields the same class
//! - First match wins

pub mod classifier;
pub mod matcher;

pub use classifier::{RequestClassifier, RouteClass};
