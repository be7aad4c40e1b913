//! # rokuctl-core - Core Domain Types
//!
//! Foundation crate for rokuctl. Provides the remote key surface, the
//! well-known debug log ports, error handling, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (thiserror, tracing, percent-encoding, and the
//! transport error types).
//!
//! ## Public API
//!
//! - [`Key`] / [`NAMED_KEYS`] - remote-control key surface, including
//!   literal-character presses for text entry
//! - [`LogPort`] - named debug log ports (main, sg, task1-4x, profiler)
//! - [`Error`] / [`Result`] / [`ResultExt`] - workspace error taxonomy
//! - [`logging::init`](logging::init) - tracing setup for the CLI
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use rokuctl_core::prelude::*;
//! ```

pub mod error;
pub mod keys;
pub mod logging;
pub mod ports;

/// Prelude for common imports used throughout all rokuctl crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use keys::{Key, NAMED_KEYS};
pub use ports::LogPort;
