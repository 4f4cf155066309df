//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber wakes → server stops accepting → in-flight drains
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
